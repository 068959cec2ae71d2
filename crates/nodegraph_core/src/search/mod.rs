//! Node search entry points.
//!
//! # Responsibility
//! - Expose predicate-based lookup over node text and tags.
//! - Keep matching rules inside core so every host sees the same results.

pub mod text;
