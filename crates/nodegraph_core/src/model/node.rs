//! Node domain model.
//!
//! # Responsibility
//! - Define the typed knowledge unit and its edge fields.
//! - Provide set-like edge helpers used by the reference index.
//!
//! # Invariants
//! - `id`, `kind` and `created_at` never change after creation.
//! - Edge vectors never contain duplicates; insertion order is preserved.
//! - Edge fields are only changed through the reference index, never by
//!   callers patching a record directly.

use crate::model::supertag::SuperTag;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for nodes.
pub type NodeId = Uuid;

/// Node category, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Note,
    Task,
    DailyNote,
    Collection,
    Reference,
    Media,
    Custom,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        Self::Note,
        Self::Task,
        Self::DailyNote,
        Self::Collection,
        Self::Reference,
        Self::Media,
        Self::Custom,
    ];

    /// Storage/wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Task => "task",
            Self::DailyNote => "daily_note",
            Self::Collection => "collection",
            Self::Reference => "reference",
            Self::Media => "media",
            Self::Custom => "custom",
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    /// Accepts storage names case-insensitively (`daily_note`, `DAILY_NOTE`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownNodeType(value.trim().to_string()))
    }
}

/// Canonical node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub title: String,
    pub content: String,
    /// Trimmed, deduplicated ignoring case, in first-seen spelling and order.
    pub tags: Vec<String>,
    pub supertags: Vec<SuperTag>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, refreshed on every mutation.
    pub updated_at: i64,
    pub parent: Option<NodeId>,
    /// Derived from children's `parent` pointers, in attachment order.
    pub children: Vec<NodeId>,
    pub references: Vec<NodeId>,
    pub referenced_by: Vec<NodeId>,
    /// Supertag field values keyed by field id.
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    /// Creates a node with a generated id and empty edge sets.
    ///
    /// # Invariants
    /// - `created_at == updated_at == now`.
    pub fn new(
        kind: NodeType,
        title: impl Into<String>,
        content: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            supertags: Vec::new(),
            created_at: now,
            updated_at: now,
            parent: None,
            children: Vec::new(),
            references: Vec::new(),
            referenced_by: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Validates user-editable fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ValidationError::BlankTag);
        }

        let mut seen = HashSet::new();
        for supertag in &self.supertags {
            supertag.validate()?;
            if !seen.insert(supertag.id.as_str()) {
                return Err(ValidationError::InvalidSuperTag(format!(
                    "supertag `{}` attached twice",
                    supertag.id
                )));
            }
        }
        Ok(())
    }

    /// Refreshes `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }

    /// Whether any edge field of this node points at `id`.
    pub fn mentions(&self, id: NodeId) -> bool {
        self.parent == Some(id)
            || self.children.contains(&id)
            || self.references.contains(&id)
            || self.referenced_by.contains(&id)
    }

    pub(crate) fn link_outgoing(&mut self, target: NodeId) -> bool {
        insert_unique(&mut self.references, target)
    }

    pub(crate) fn unlink_outgoing(&mut self, target: NodeId) -> bool {
        remove_all(&mut self.references, target)
    }

    pub(crate) fn link_incoming(&mut self, source: NodeId) -> bool {
        insert_unique(&mut self.referenced_by, source)
    }

    pub(crate) fn unlink_incoming(&mut self, source: NodeId) -> bool {
        remove_all(&mut self.referenced_by, source)
    }

    pub(crate) fn attach_child(&mut self, child: NodeId) -> bool {
        insert_unique(&mut self.children, child)
    }

    pub(crate) fn detach_child(&mut self, child: NodeId) -> bool {
        remove_all(&mut self.children, child)
    }
}

/// Normalizes tag input: trim, then drop case-insensitive repeats.
///
/// The first spelling of each tag wins and input order is kept.
///
/// # Errors
/// - Returns `ValidationError::BlankTag` when any entry is blank.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::BlankTag);
        }
        if seen.insert(trimmed.to_lowercase()) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

fn insert_unique(ids: &mut Vec<NodeId>, id: NodeId) -> bool {
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    true
}

fn remove_all(ids: &mut Vec<NodeId>, id: NodeId) -> bool {
    let before = ids.len();
    ids.retain(|current| *current != id);
    ids.len() != before
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, Node, NodeType};
    use crate::model::ValidationError;

    #[test]
    fn node_type_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!("DAILY_NOTE".parse::<NodeType>().unwrap(), NodeType::DailyNote);
        assert_eq!(" media ".parse::<NodeType>().unwrap(), NodeType::Media);

        let err = "widget".parse::<NodeType>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownNodeType("widget".to_string()));
    }

    #[test]
    fn node_serializes_kind_as_type() {
        let node = Node::new(NodeType::Collection, "Inbox", "", 10);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "collection");
        assert_eq!(value["created_at"], value["updated_at"]);
    }

    #[test]
    fn edge_helpers_keep_ids_unique() {
        let mut node = Node::new(NodeType::Note, "a", "", 0);
        let other = uuid::Uuid::new_v4();

        assert!(node.link_outgoing(other));
        assert!(!node.link_outgoing(other));
        assert_eq!(node.references, vec![other]);
        assert!(node.mentions(other));

        assert!(node.unlink_outgoing(other));
        assert!(!node.unlink_outgoing(other));
        assert!(!node.mentions(other));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut node = Node::new(NodeType::Note, "a", "", 100);
        node.touch(50);
        assert_eq!(node.updated_at, 100);
        node.touch(150);
        assert_eq!(node.updated_at, 150);
        assert_eq!(node.created_at, 100);
    }

    #[test]
    fn normalize_tags_keeps_first_spelling_and_dedupes_ignoring_case() {
        let tags = normalize_tags(&[
            "Work".to_string(),
            " work ".to_string(),
            "NYC".to_string(),
            "WORK".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["Work".to_string(), "NYC".to_string()]);

        assert_eq!(
            normalize_tags(&["  ".to_string()]).unwrap_err(),
            ValidationError::BlankTag
        );
    }
}
