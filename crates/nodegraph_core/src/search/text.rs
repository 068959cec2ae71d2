//! Case-insensitive text search over nodes.
//!
//! # Invariants
//! - A node matches when the query is a substring of its title or content,
//!   or equals one of its tags, ignoring case.
//! - Blank queries match nothing.
//! - Results keep store order (creation order).

use crate::model::node::{Node, NodeType};
use crate::repo::node_repo::NodeRepository;
use crate::repo::RepoResult;

/// Search options for node text lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSearchQuery {
    /// User query text.
    pub text: String,
    /// Optional type filter.
    pub kind: Option<NodeType>,
    /// Maximum number of hits; `None` returns every match.
    pub limit: Option<usize>,
}

impl NodeSearchQuery {
    /// Creates an unfiltered, unlimited query.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            limit: None,
        }
    }

    pub fn with_kind(mut self, kind: NodeType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn needle(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }
}

/// Whether `node` matches the lowercased `needle`.
pub fn node_matches(node: &Node, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle)
        || node.content.to_lowercase().contains(needle)
        || node.tags.iter().any(|tag| tag.to_lowercase() == needle)
}

/// Runs `query` as a predicate scan over the node store.
pub fn search_nodes<R: NodeRepository + ?Sized>(
    repo: &R,
    query: &NodeSearchQuery,
) -> RepoResult<Vec<Node>> {
    let Some(needle) = query.needle() else {
        return Ok(Vec::new());
    };
    if query.limit == Some(0) {
        return Ok(Vec::new());
    }

    let mut hits = repo.scan_nodes(&mut |node| {
        query.kind.map_or(true, |kind| node.kind == kind) && node_matches(node, &needle)
    })?;
    if let Some(limit) = query.limit {
        hits.truncate(limit);
    }
    Ok(hits)
}
