//! Task repository contracts and SQLite implementation.

use crate::model::task::{Task, TaskId, TaskPriority};
use crate::model::EntityKind;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    content,
    completed,
    due_date,
    priority
FROM tasks";

/// Keyed storage contract for task records.
pub trait TaskRepository {
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn load_task(&self, id: TaskId) -> RepoResult<Task> {
        self.get_task(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Task,
            id,
        })
    }
    /// Inserts or replaces one task record.
    fn put_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// All tasks in insertion order.
    fn list_tasks(&self) -> RepoResult<Vec<Task>>;
    /// Resolves ids in the given order; unknown ids are skipped.
    fn get_tasks(&self, ids: &[TaskId]) -> RepoResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(*id)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn put_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (id, content, completed, due_date, priority)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                completed = excluded.completed,
                due_date = excluded.due_date,
                priority = excluded.priority;",
            params![
                task.id.to_string(),
                task.content.as_str(),
                bool_to_int(task.completed),
                task.due_date.as_deref(),
                task.priority.map(TaskPriority::as_str),
            ],
        )?;
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Task,
                id,
            });
        }
        Ok(())
    }

    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let priority = match row.get::<_, Option<String>>("priority")? {
        Some(value) => Some(value.parse::<TaskPriority>().map_err(|_| {
            RepoError::InvalidData(format!("invalid priority `{value}` in tasks.priority"))
        })?),
        None => None,
    };

    Ok(Task {
        id: parse_uuid(&id_text, "tasks.id")?,
        content: row.get("content")?,
        completed: int_to_bool(row.get("completed")?, "tasks.completed")?,
        due_date: row.get("due_date")?,
        priority,
    })
}
