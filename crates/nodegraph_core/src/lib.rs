//! Node reference graph core.
//! This crate is the single source of truth for graph invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, DailyNoteLinkPolicy, GraphConfig, SelfReferencePolicy};
pub use error::{GraphError, GraphResult};
pub use index::{EdgeChange, ExciseReport, ReferenceIndex};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::caller::Caller;
pub use model::daily_note::{DailyNote, DailyNoteId};
pub use model::node::{Node, NodeId, NodeType};
pub use model::supertag::{Field, FieldType, SuperTag};
pub use model::task::{Task, TaskId, TaskPriority};
pub use model::{EntityKind, ValidationError};
pub use repo::{RepoError, RepoResult};
pub use search::text::NodeSearchQuery;
pub use service::{
    DailyNoteView, GraphService, NewNode, NewTask, NodePatch, QueryService, TaskPatch,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
