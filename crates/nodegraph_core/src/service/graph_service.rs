//! Graph mutation service: the only writer of nodes, tasks and daily notes.
//!
//! # Responsibility
//! - Validate mutation input before anything is written.
//! - Route every edge change through the reference index.
//! - Run each mutation in one `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - A returned error means no record changed.
//! - `created_at` is never rewritten; `updated_at` moves on every write.
//! - A task id appears in at most one daily note task list.

use crate::config::{DailyNoteLinkPolicy, GraphConfig};
use crate::error::{GraphError, GraphResult};
use crate::index::{EdgeChange, ReferenceIndex};
use crate::model::caller::Caller;
use crate::model::daily_note::{normalize_calendar_date, DailyNote, DailyNoteId};
use crate::model::node::{normalize_tags, Node, NodeId, NodeType};
use crate::model::supertag::SuperTag;
use crate::model::task::{Task, TaskId, TaskPriority};
use crate::model::{now_epoch_ms, EntityKind};
use crate::repo::daily_note_repo::{DailyNoteRepository, SqliteDailyNoteRepository};
use crate::repo::ensure_connection_ready;
use crate::repo::node_repo::{NodeRepository, SqliteNodeRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// Input for [`GraphService::create_node`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub kind: NodeType,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub supertags: Vec<SuperTag>,
    pub parent: Option<NodeId>,
}

impl NewNode {
    pub fn new(kind: NodeType, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: String::new(),
            tags: Vec::new(),
            supertags: Vec::new(),
            parent: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_supertags(mut self, supertags: Vec<SuperTag>) -> Self {
        self.supertags = supertags;
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Partial node update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<String>>,
    /// Replaces the whole supertag list.
    pub supertags: Option<Vec<SuperTag>>,
    /// Replaces the whole property map.
    pub properties: Option<BTreeMap<String, Value>>,
    /// `Some(None)` moves the node to the root.
    pub parent: Option<Option<NodeId>>,
}

/// Input for [`GraphService::create_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub content: String,
    pub due_date: Option<String>,
    pub priority: Option<TaskPriority>,
    /// Daily note whose task list receives the new task.
    pub daily_note_id: Option<DailyNoteId>,
}

impl NewTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            due_date: None,
            priority: None,
            daily_note_id: None,
        }
    }

    pub fn in_daily_note(mut self, daily_note_id: DailyNoteId) -> Self {
        self.daily_note_id = Some(daily_note_id);
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Partial task update; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<String>>,
    pub priority: Option<Option<TaskPriority>>,
}

/// Write-side facade over one SQLite connection.
pub struct GraphService<'conn> {
    conn: &'conn Connection,
    config: GraphConfig,
}

impl<'conn> GraphService<'conn> {
    pub fn new(conn: &'conn Connection, config: GraphConfig) -> Self {
        Self { conn, config }
    }

    /// Creates a service after checking the connection schema is current.
    pub fn try_new(conn: &'conn Connection, config: GraphConfig) -> GraphResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, config })
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    /// Creates a node with empty edge sets, optionally under `parent`.
    ///
    /// # Errors
    /// - `Validation` for a blank title, blank tag or malformed supertag.
    /// - `NotFound` when `parent` does not resolve; nothing is created.
    pub fn create_node(&self, caller: &Caller, input: NewNode) -> GraphResult<Node> {
        let mut node = Node::new(input.kind, input.title, input.content, now_epoch_ms());
        node.tags = normalize_tags(&input.tags)?;
        node.supertags = input.supertags;
        node.validate()?;
        // Born with its parent pointer, so the index only attaches the parent side.
        node.parent = input.parent;

        self.write("create_node", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            nodes.put_node(&node)?;
            if let Some(parent_id) = node.parent {
                ReferenceIndex::new(&nodes, self.config).reparent(node.id, Some(parent_id))?;
            }
            Ok(node)
        })
    }

    /// Applies the provided patch fields to one node.
    ///
    /// # Errors
    /// - `NotFound` when the node or a new parent does not resolve.
    /// - `Validation` for a blank title, blank tag or malformed supertag.
    /// - `Cycle` when the new parent is the node or one of its descendants.
    pub fn update_node(&self, caller: &Caller, id: NodeId, patch: NodePatch) -> GraphResult<Node> {
        let tags = patch.tags.as_deref().map(normalize_tags).transpose()?;

        self.write("update_node", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            let mut node = nodes.load_node(id)?;
            if let Some(title) = patch.title {
                node.title = title;
            }
            if let Some(content) = patch.content {
                node.content = content;
            }
            if let Some(tags) = tags {
                node.tags = tags;
            }
            if let Some(supertags) = patch.supertags {
                node.supertags = supertags;
            }
            if let Some(properties) = patch.properties {
                node.properties = properties;
            }
            node.touch(now_epoch_ms());
            node.validate()?;
            nodes.put_node(&node)?;

            match patch.parent {
                Some(parent) => {
                    ReferenceIndex::new(&nodes, self.config).reparent(id, parent)?;
                    Ok(nodes.load_node(id)?)
                }
                None => Ok(node),
            }
        })
    }

    /// Excises every edge touching the node, then removes it.
    ///
    /// Children are orphaned, not deleted.
    pub fn delete_node(&self, caller: &Caller, id: NodeId) -> GraphResult<bool> {
        self.write("delete_node", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            ReferenceIndex::new(&nodes, self.config).remove_node(id)?;
            Ok(true)
        })
    }

    /// Adds the edge `source -> target`; repeating it is a no-op.
    pub fn add_reference(
        &self,
        caller: &Caller,
        source: NodeId,
        target: NodeId,
    ) -> GraphResult<EdgeChange> {
        self.write("add_reference", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            ReferenceIndex::new(&nodes, self.config).add_reference(source, target)
        })
    }

    /// Removes the edge `source -> target`; a missing edge is a no-op.
    pub fn remove_reference(
        &self,
        caller: &Caller,
        source: NodeId,
        target: NodeId,
    ) -> GraphResult<EdgeChange> {
        self.write("remove_reference", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            ReferenceIndex::new(&nodes, self.config).remove_reference(source, target)
        })
    }

    /// Moves `child` under `parent`, or to the root when `None`.
    pub fn reparent(
        &self,
        caller: &Caller,
        child: NodeId,
        parent: Option<NodeId>,
    ) -> GraphResult<EdgeChange> {
        self.write("reparent", caller, |conn| {
            let nodes = SqliteNodeRepository::new(conn);
            ReferenceIndex::new(&nodes, self.config).reparent(child, parent)
        })
    }

    /// Creates the daily note for `date` (`YYYY-MM-DD`).
    ///
    /// # Errors
    /// - `Validation` for a malformed or impossible date.
    /// - `Conflict` when a note for that date already exists.
    pub fn create_daily_note(
        &self,
        caller: &Caller,
        date: &str,
        content: impl Into<String>,
    ) -> GraphResult<DailyNote> {
        let date = normalize_calendar_date(date)?;
        let note = DailyNote::new(date, content);

        self.write("create_daily_note", caller, |conn| {
            let daily_notes = SqliteDailyNoteRepository::new(conn);
            if daily_notes.find_by_date(&note.date)?.is_some() {
                return Err(GraphError::Conflict(format!(
                    "daily note for {} already exists",
                    note.date
                )));
            }
            daily_notes.put_daily_note(&note)?;
            Ok(note)
        })
    }

    /// Replaces the content of one daily note.
    pub fn update_daily_note(
        &self,
        caller: &Caller,
        id: DailyNoteId,
        content: impl Into<String>,
    ) -> GraphResult<DailyNote> {
        let content = content.into();
        self.write("update_daily_note", caller, |conn| {
            let daily_notes = SqliteDailyNoteRepository::new(conn);
            let mut note = daily_notes.load_daily_note(id)?;
            note.content = content;
            daily_notes.put_daily_note(&note)?;
            Ok(note)
        })
    }

    /// Removes one daily note; its tasks survive, unlinked.
    pub fn delete_daily_note(&self, caller: &Caller, id: DailyNoteId) -> GraphResult<bool> {
        self.write("delete_daily_note", caller, |conn| {
            SqliteDailyNoteRepository::new(conn).delete_daily_note(id)?;
            Ok(true)
        })
    }

    /// Creates a task, appending it to its daily note when one is given.
    ///
    /// An unresolved `daily_note_id` follows `GraphConfig::daily_note_links`:
    /// lenient creates the task unlinked, strict fails with `NotFound`.
    pub fn create_task(&self, caller: &Caller, input: NewTask) -> GraphResult<Task> {
        let mut task = Task::new(input.content);
        task.due_date = input
            .due_date
            .as_deref()
            .map(normalize_calendar_date)
            .transpose()?;
        task.priority = input.priority;
        task.validate()?;

        self.write("create_task", caller, |conn| {
            let tasks = SqliteTaskRepository::new(conn);
            let daily_notes = SqliteDailyNoteRepository::new(conn);

            let daily_note = match input.daily_note_id {
                Some(note_id) => match daily_notes.get_daily_note(note_id)? {
                    Some(note) => Some(note),
                    None if self.config.daily_note_links == DailyNoteLinkPolicy::Strict => {
                        return Err(GraphError::not_found(EntityKind::DailyNote, note_id));
                    }
                    None => {
                        warn!(
                            "event=task_link module=service status=skipped task_id={} daily_note_id={note_id} reason=daily_note_missing",
                            task.id
                        );
                        None
                    }
                },
                None => None,
            };

            tasks.put_task(&task)?;
            if let Some(mut note) = daily_note {
                if note.push_task(task.id) {
                    daily_notes.put_daily_note(&note)?;
                }
            }
            Ok(task)
        })
    }

    /// Applies the provided patch fields to one task.
    pub fn update_task(&self, caller: &Caller, id: TaskId, patch: TaskPatch) -> GraphResult<Task> {
        let due_date = match patch.due_date {
            Some(Some(raw)) => Some(Some(normalize_calendar_date(&raw)?)),
            other => other,
        };

        self.write("update_task", caller, |conn| {
            let tasks = SqliteTaskRepository::new(conn);
            let mut task = tasks.load_task(id)?;
            if let Some(content) = patch.content {
                task.content = content;
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            if let Some(due_date) = due_date {
                task.due_date = due_date;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            task.validate()?;
            tasks.put_task(&task)?;
            Ok(task)
        })
    }

    /// Prunes the task from every daily note task list, then deletes it.
    pub fn delete_task(&self, caller: &Caller, id: TaskId) -> GraphResult<bool> {
        self.write("delete_task", caller, |conn| {
            let tasks = SqliteTaskRepository::new(conn);
            let daily_notes = SqliteDailyNoteRepository::new(conn);
            tasks.load_task(id)?;

            let holders = daily_notes.scan_daily_notes(&mut |note| note.tasks.contains(&id))?;
            for mut note in holders {
                note.remove_task(id);
                daily_notes.put_daily_note(&note)?;
            }
            tasks.delete_task(id)?;
            Ok(true)
        })
    }

    /// Runs `apply` inside one IMMEDIATE transaction and logs the outcome.
    fn write<T>(
        &self,
        op: &'static str,
        caller: &Caller,
        apply: impl FnOnce(&Connection) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let started = Instant::now();
        let result = run_immediate(self.conn, apply);
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(_) => info!(
                "event=graph_mutation module=service status=ok op={op} actor={} duration_ms={duration_ms}",
                caller.log_label()
            ),
            Err(err) => warn!(
                "event=graph_mutation module=service status=error op={op} actor={} duration_ms={duration_ms} error_code={}",
                caller.log_label(),
                err.code()
            ),
        }
        result
    }
}

fn run_immediate<T>(
    conn: &Connection,
    apply: impl FnOnce(&Connection) -> GraphResult<T>,
) -> GraphResult<T> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = apply(&tx)?;
    tx.commit()?;
    Ok(value)
}
