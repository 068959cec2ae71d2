//! Domain model for the node graph.
//!
//! # Responsibility
//! - Define canonical records for nodes, tasks and daily notes.
//! - Own field-level validation shared by repositories and services.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Edge fields (`references`, `referenced_by`, `parent`, `children`,
//!   daily-note `tasks`) hold opaque ids, never embedded records.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod caller;
pub mod daily_note;
pub mod node;
pub mod supertag;
pub mod task;

/// Record family stored by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Task,
    DailyNote,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Task => "task",
            Self::DailyNote => "daily_note",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation failure for model records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Node title is empty after trim.
    BlankTitle,
    /// Task content is empty after trim.
    BlankTaskContent,
    /// A tag value is empty after trim.
    BlankTag,
    /// Node type string is not one of the known variants.
    UnknownNodeType(String),
    /// Task priority string is not one of the known variants.
    UnknownPriority(String),
    /// Value is not a `YYYY-MM-DD` calendar date.
    InvalidDate(String),
    /// SuperTag or field definition is malformed.
    InvalidSuperTag(String),
    /// Self edge rejected by the active graph configuration.
    SelfReference(uuid::Uuid),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "title must not be blank"),
            Self::BlankTaskContent => write!(f, "task content must not be blank"),
            Self::BlankTag => write!(f, "tag must not be blank"),
            Self::UnknownNodeType(value) => write!(
                f,
                "unknown node type `{value}`; expected note|task|daily_note|collection|reference|media|custom"
            ),
            Self::UnknownPriority(value) => {
                write!(f, "unknown priority `{value}`; expected low|medium|high")
            }
            Self::InvalidDate(value) => {
                write!(f, "invalid calendar date `{value}`; expected YYYY-MM-DD")
            }
            Self::InvalidSuperTag(message) => write!(f, "invalid supertag: {message}"),
            Self::SelfReference(id) => write!(f, "self reference is not allowed: {id}"),
        }
    }
}

impl Error for ValidationError {}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
