//! Graph behavior configuration.
//!
//! # Responsibility
//! - Hold policy switches whose "right" behavior is a host decision.
//! - Load from JSON supplied by the host (settings file, FFI payload).
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown keys are rejected.
//! - Defaults reproduce the lenient legacy behavior.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whether `add_reference(a, a)` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfReferencePolicy {
    /// Self edges are stored like any other edge.
    #[default]
    Allow,
    /// Self edges fail with a validation error.
    Reject,
}

/// What `create_task` does when its daily note id does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyNoteLinkPolicy {
    /// Create the task unlinked and log a warning.
    #[default]
    Lenient,
    /// Fail with not-found; no task is created.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub self_references: SelfReferencePolicy,
    pub daily_note_links: DailyNoteLinkPolicy,
}

impl GraphConfig {
    /// Rejects self edges and unresolved daily note links.
    pub fn strict() -> Self {
        Self {
            self_references: SelfReferencePolicy::Reject,
            daily_note_links: DailyNoteLinkPolicy::Strict,
        }
    }

    /// Parses a JSON object such as `{"self_references": "reject"}`.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Parse)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid graph config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
        }
    }
}
