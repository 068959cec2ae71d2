//! Core use-case services.
//!
//! # Responsibility
//! - `GraphService` owns every write and its transaction boundary.
//! - `QueryService` resolves records for read-only callers.

pub mod graph_service;
pub mod query_service;

pub use graph_service::{GraphService, NewNode, NewTask, NodePatch, TaskPatch};
pub use query_service::{DailyNoteView, QueryService};
