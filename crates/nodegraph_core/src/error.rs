//! Graph-level error taxonomy returned by the index and services.
//!
//! # Invariants
//! - Every failure is reported synchronously; nothing is retried in core.
//! - A returned error means no mutation became visible.

use crate::db::DbError;
use crate::model::node::NodeId;
use crate::model::{EntityKind, ValidationError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug)]
pub enum GraphError {
    /// Id does not resolve to a record.
    NotFound { kind: EntityKind, id: Uuid },
    /// Malformed input: blank required field, unknown enum variant.
    Validation(ValidationError),
    /// Uniqueness violation, e.g. a second daily note for one date.
    Conflict(String),
    /// Reparent would make `node` its own ancestor.
    Cycle { node: NodeId, parent: NodeId },
    /// Storage failure below the graph layer.
    Repo(RepoError),
}

impl GraphError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Cycle { .. } => "cycle",
            Self::Repo(_) => "storage",
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Cycle { node, parent } => write!(
                f,
                "reparent would create cycle: node {node} under parent {parent}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for GraphError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for GraphError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::UniqueViolation { table, key } => {
                Self::Conflict(format!("`{key}` already exists in {table}"))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for GraphError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
