//! Edge bookkeeping over the node store.
//!
//! # Responsibility
//! - Keep `references`/`referenced_by` and `parent`/`children` consistent.
//! - Undo partial multi-record writes when an operation fails midway.

mod journal;
pub mod reference_index;

pub use reference_index::{EdgeChange, ExciseReport, ReferenceIndex};
