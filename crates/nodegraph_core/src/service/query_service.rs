//! Read-side graph queries.
//!
//! # Responsibility
//! - Resolve ids and edge lists into records for hosts.
//! - Join daily notes with their tasks.
//!
//! # Invariants
//! - Never writes.
//! - Task lists resolve in daily note order; ids whose task is gone are skipped.

use crate::error::GraphResult;
use crate::model::daily_note::{normalize_calendar_date, DailyNote, DailyNoteId};
use crate::model::node::{Node, NodeId, NodeType};
use crate::model::task::{Task, TaskId};
use crate::repo::daily_note_repo::{DailyNoteRepository, SqliteDailyNoteRepository};
use crate::repo::ensure_connection_ready;
use crate::repo::node_repo::{NodeListQuery, NodeRepository, SqliteNodeRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::search::text::{search_nodes, NodeSearchQuery};
use rusqlite::Connection;
use serde::Serialize;

/// Daily note with its task list resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyNoteView {
    pub note: DailyNote,
    pub tasks: Vec<Task>,
}

pub struct QueryService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> QueryService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> GraphResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn nodes(&self) -> SqliteNodeRepository<'conn> {
        SqliteNodeRepository::new(self.conn)
    }

    fn tasks(&self) -> SqliteTaskRepository<'conn> {
        SqliteTaskRepository::new(self.conn)
    }

    fn daily_notes(&self) -> SqliteDailyNoteRepository<'conn> {
        SqliteDailyNoteRepository::new(self.conn)
    }

    /// Loads one node; `NotFound` when absent.
    pub fn get_node(&self, id: NodeId) -> GraphResult<Node> {
        Ok(self.nodes().load_node(id)?)
    }

    /// All nodes in creation order.
    pub fn list_nodes(&self) -> GraphResult<Vec<Node>> {
        self.list_nodes_with(&NodeListQuery::default())
    }

    pub fn list_nodes_with(&self, query: &NodeListQuery) -> GraphResult<Vec<Node>> {
        Ok(self.nodes().list_nodes(query)?)
    }

    pub fn list_nodes_by_type(&self, kind: NodeType) -> GraphResult<Vec<Node>> {
        self.list_nodes_with(&NodeListQuery {
            kind: Some(kind),
            ..NodeListQuery::default()
        })
    }

    pub fn children_of(&self, id: NodeId) -> GraphResult<Vec<Node>> {
        let node = self.get_node(id)?;
        self.resolve_nodes(&node.children)
    }

    /// Nodes this node links to.
    pub fn references_of(&self, id: NodeId) -> GraphResult<Vec<Node>> {
        let node = self.get_node(id)?;
        self.resolve_nodes(&node.references)
    }

    /// Nodes linking to this node.
    pub fn backlinks_of(&self, id: NodeId) -> GraphResult<Vec<Node>> {
        let node = self.get_node(id)?;
        self.resolve_nodes(&node.referenced_by)
    }

    /// Case-insensitive match on title, content and tags.
    pub fn search_nodes(&self, text: &str) -> GraphResult<Vec<Node>> {
        self.search(&NodeSearchQuery::new(text))
    }

    pub fn search(&self, query: &NodeSearchQuery) -> GraphResult<Vec<Node>> {
        Ok(search_nodes(&self.nodes(), query)?)
    }

    /// Daily note for `date` with tasks resolved, `None` when absent.
    ///
    /// # Errors
    /// - `Validation` for a malformed date.
    pub fn get_daily_note_by_date(&self, date: &str) -> GraphResult<Option<DailyNoteView>> {
        let date = normalize_calendar_date(date)?;
        self.daily_notes()
            .find_by_date(&date)?
            .map(|note| self.resolve_daily_note(note))
            .transpose()
    }

    pub fn get_daily_note(&self, id: DailyNoteId) -> GraphResult<DailyNoteView> {
        let note = self.daily_notes().load_daily_note(id)?;
        self.resolve_daily_note(note)
    }

    /// All daily notes, newest date first, tasks resolved.
    pub fn list_daily_notes(&self) -> GraphResult<Vec<DailyNoteView>> {
        self.daily_notes()
            .list_daily_notes()?
            .into_iter()
            .map(|note| self.resolve_daily_note(note))
            .collect()
    }

    pub fn get_task(&self, id: TaskId) -> GraphResult<Task> {
        Ok(self.tasks().load_task(id)?)
    }

    pub fn list_tasks(&self) -> GraphResult<Vec<Task>> {
        Ok(self.tasks().list_tasks()?)
    }

    fn resolve_daily_note(&self, note: DailyNote) -> GraphResult<DailyNoteView> {
        let tasks = self.tasks().get_tasks(&note.tasks)?;
        Ok(DailyNoteView { note, tasks })
    }

    fn resolve_nodes(&self, ids: &[NodeId]) -> GraphResult<Vec<Node>> {
        let nodes = self.nodes();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = nodes.get_node(*id)? {
                resolved.push(node);
            }
        }
        Ok(resolved)
    }
}
