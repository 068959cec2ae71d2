//! Daily note repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `date` is unique; a second record for the same date surfaces as
//!   `RepoError::UniqueViolation`.
//! - Listing order is `date DESC`.

use crate::model::daily_note::{DailyNote, DailyNoteId};
use crate::model::EntityKind;
use crate::repo::{
    decode_json, encode_json, ensure_connection_ready, is_unique_violation, parse_uuid,
    RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const DAILY_NOTE_SELECT_SQL: &str = "SELECT
    id,
    date,
    content,
    task_ids_json
FROM daily_notes";

/// Keyed storage contract for daily note records.
pub trait DailyNoteRepository {
    fn get_daily_note(&self, id: DailyNoteId) -> RepoResult<Option<DailyNote>>;
    fn load_daily_note(&self, id: DailyNoteId) -> RepoResult<DailyNote> {
        self.get_daily_note(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::DailyNote,
            id,
        })
    }
    fn find_by_date(&self, date: &str) -> RepoResult<Option<DailyNote>>;
    /// Inserts or replaces one daily note record.
    fn put_daily_note(&self, note: &DailyNote) -> RepoResult<()>;
    fn delete_daily_note(&self, id: DailyNoteId) -> RepoResult<()>;
    /// All daily notes, newest date first.
    fn list_daily_notes(&self) -> RepoResult<Vec<DailyNote>>;
    fn scan_daily_notes(
        &self,
        predicate: &mut dyn FnMut(&DailyNote) -> bool,
    ) -> RepoResult<Vec<DailyNote>>;
}

/// SQLite-backed daily note repository.
pub struct SqliteDailyNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDailyNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_notes(&self, sql: &str) -> RepoResult<Vec<DailyNote>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_daily_note_row(row)?);
        }
        Ok(notes)
    }
}

impl DailyNoteRepository for SqliteDailyNoteRepository<'_> {
    fn get_daily_note(&self, id: DailyNoteId) -> RepoResult<Option<DailyNote>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DAILY_NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_daily_note_row(row)?));
        }
        Ok(None)
    }

    fn find_by_date(&self, date: &str) -> RepoResult<Option<DailyNote>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DAILY_NOTE_SELECT_SQL} WHERE date = ?1;"))?;
        let mut rows = stmt.query([date])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_daily_note_row(row)?));
        }
        Ok(None)
    }

    fn put_daily_note(&self, note: &DailyNote) -> RepoResult<()> {
        note.validate()?;

        let result = self.conn.execute(
            "INSERT INTO daily_notes (id, date, content, task_ids_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                date = excluded.date,
                content = excluded.content,
                task_ids_json = excluded.task_ids_json;",
            params![
                note.id.to_string(),
                note.date.as_str(),
                note.content.as_str(),
                encode_json(&note.tasks, "daily_notes.task_ids_json")?,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::UniqueViolation {
                table: "daily_notes",
                key: note.date.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_daily_note(&self, id: DailyNoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM daily_notes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::DailyNote,
                id,
            });
        }
        Ok(())
    }

    fn list_daily_notes(&self) -> RepoResult<Vec<DailyNote>> {
        self.query_notes(&format!("{DAILY_NOTE_SELECT_SQL} ORDER BY date DESC;"))
    }

    fn scan_daily_notes(
        &self,
        predicate: &mut dyn FnMut(&DailyNote) -> bool,
    ) -> RepoResult<Vec<DailyNote>> {
        let mut notes = self.query_notes(&format!("{DAILY_NOTE_SELECT_SQL} ORDER BY date DESC;"))?;
        notes.retain(|note| predicate(note));
        Ok(notes)
    }
}

fn parse_daily_note_row(row: &Row<'_>) -> RepoResult<DailyNote> {
    let id_text: String = row.get("id")?;
    let task_ids_json: String = row.get("task_ids_json")?;

    let note = DailyNote {
        id: parse_uuid(&id_text, "daily_notes.id")?,
        date: row.get("date")?,
        content: row.get("content")?,
        tasks: decode_json(&task_ids_json, "daily_notes.task_ids_json")?,
    };
    note.validate()
        .map_err(|err| RepoError::InvalidData(format!("daily note {id_text}: {err}")))?;
    Ok(note)
}
