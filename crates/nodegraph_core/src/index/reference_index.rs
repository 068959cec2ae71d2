//! Reference index: symmetric edges and the parent/child tree.
//!
//! # Responsibility
//! - Maintain `references` / `referenced_by` as mirror images.
//! - Maintain `children` as the inverse of `parent`.
//! - Excise every edge touching a node before it is deleted.
//!
//! # Invariants
//! - For all nodes A, B: `B ∈ A.references ⇔ A ∈ B.referenced_by`.
//! - For all nodes A, B: `B.parent == Some(A) ⇔ B ∈ A.children`.
//! - The parent relation is acyclic.
//! - Each operation writes all touched records or, through the write
//!   journal, none of them.

use crate::config::{GraphConfig, SelfReferencePolicy};
use crate::error::{GraphError, GraphResult};
use crate::index::journal::WriteJournal;
use crate::model::node::{Node, NodeId};
use crate::model::{now_epoch_ms, ValidationError};
use crate::repo::node_repo::NodeRepository;
use log::debug;
use std::collections::HashSet;

/// Outcome of an idempotent edge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChange {
    /// Records were rewritten.
    Applied,
    /// The requested state already held; nothing was written.
    Unchanged,
}

impl EdgeChange {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// What `excise` removed from the rest of the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExciseReport {
    /// Other nodes' `references` entries pointing at the excised node.
    pub inbound_edges_removed: usize,
    /// Other nodes' `referenced_by` entries naming the excised node.
    pub outbound_edges_removed: usize,
    /// Children whose `parent` was cleared.
    pub orphaned_children: usize,
    /// Whether the node was removed from its parent's `children`.
    pub detached_from_parent: bool,
    /// Records rewritten, including the excised node itself.
    pub records_written: usize,
}

/// Invariant-enforcing writer of node edge fields.
pub struct ReferenceIndex<R: NodeRepository> {
    repo: R,
    config: GraphConfig,
}

impl<R: NodeRepository> ReferenceIndex<R> {
    pub fn new(repo: R, config: GraphConfig) -> Self {
        Self { repo, config }
    }

    /// Adds the edge `source -> target`.
    ///
    /// # Errors
    /// - `NotFound` when either node is missing.
    /// - `Validation` for `source == target` under `SelfReferencePolicy::Reject`.
    pub fn add_reference(&self, source_id: NodeId, target_id: NodeId) -> GraphResult<EdgeChange> {
        if source_id == target_id && self.config.self_references == SelfReferencePolicy::Reject {
            return Err(ValidationError::SelfReference(source_id).into());
        }

        let source = self.repo.load_node(source_id)?;
        if source_id == target_id {
            return self.rewrite_single(&source, |node| {
                let outgoing = node.link_outgoing(target_id);
                let incoming = node.link_incoming(source_id);
                outgoing || incoming
            });
        }

        let target = self.repo.load_node(target_id)?;
        let now = now_epoch_ms();
        let mut updated_source = source.clone();
        let mut updated_target = target.clone();
        let source_changed = updated_source.link_outgoing(target_id);
        let target_changed = updated_target.link_incoming(source_id);
        if !source_changed && !target_changed {
            return Ok(EdgeChange::Unchanged);
        }

        let mut journal = WriteJournal::new(&self.repo);
        if source_changed {
            updated_source.touch(now);
            journal.write(&source, &updated_source)?;
        }
        if target_changed {
            updated_target.touch(now);
            journal.write(&target, &updated_target)?;
        }
        let written = journal.commit();
        debug!(
            "event=edge_add module=index status=ok source_id={source_id} target_id={target_id} records_written={written}"
        );
        Ok(EdgeChange::Applied)
    }

    /// Removes the edge `source -> target`; a missing edge is a no-op.
    ///
    /// # Errors
    /// - `NotFound` when either node is missing.
    pub fn remove_reference(
        &self,
        source_id: NodeId,
        target_id: NodeId,
    ) -> GraphResult<EdgeChange> {
        let source = self.repo.load_node(source_id)?;
        if source_id == target_id {
            return self.rewrite_single(&source, |node| {
                let outgoing = node.unlink_outgoing(target_id);
                let incoming = node.unlink_incoming(source_id);
                outgoing || incoming
            });
        }

        let target = self.repo.load_node(target_id)?;
        let now = now_epoch_ms();
        let mut updated_source = source.clone();
        let mut updated_target = target.clone();
        let source_changed = updated_source.unlink_outgoing(target_id);
        let target_changed = updated_target.unlink_incoming(source_id);
        if !source_changed && !target_changed {
            return Ok(EdgeChange::Unchanged);
        }

        let mut journal = WriteJournal::new(&self.repo);
        if source_changed {
            updated_source.touch(now);
            journal.write(&source, &updated_source)?;
        }
        if target_changed {
            updated_target.touch(now);
            journal.write(&target, &updated_target)?;
        }
        let written = journal.commit();
        debug!(
            "event=edge_remove module=index status=ok source_id={source_id} target_id={target_id} records_written={written}"
        );
        Ok(EdgeChange::Applied)
    }

    /// Moves `child` under `new_parent`, or to the root when `None`.
    ///
    /// # Errors
    /// - `NotFound` when the child or the new parent is missing.
    /// - `Cycle` when the new parent is the child or one of its descendants.
    pub fn reparent(
        &self,
        child_id: NodeId,
        new_parent_id: Option<NodeId>,
    ) -> GraphResult<EdgeChange> {
        let child = self.repo.load_node(child_id)?;

        let new_parent = match new_parent_id {
            Some(parent_id) => {
                if parent_id == child_id {
                    return Err(GraphError::Cycle {
                        node: child_id,
                        parent: parent_id,
                    });
                }
                let parent = self.repo.load_node(parent_id)?;
                self.ensure_not_descendant(child_id, &parent)?;
                Some(parent)
            }
            None => None,
        };

        let already_attached = new_parent
            .as_ref()
            .map_or(true, |parent| parent.children.contains(&child_id));
        if child.parent == new_parent_id && already_attached {
            return Ok(EdgeChange::Unchanged);
        }

        // A dangling old parent pointer is simply dropped.
        let old_parent = match child.parent {
            Some(old_id) if Some(old_id) != new_parent_id => self.repo.get_node(old_id)?,
            _ => None,
        };

        let now = now_epoch_ms();
        let mut journal = WriteJournal::new(&self.repo);

        if let Some(old_parent) = old_parent {
            let mut updated = old_parent.clone();
            if updated.detach_child(child_id) {
                updated.touch(now);
                journal.write(&old_parent, &updated)?;
            }
        }

        if child.parent != new_parent_id {
            let mut updated_child = child.clone();
            updated_child.parent = new_parent_id;
            updated_child.touch(now);
            journal.write(&child, &updated_child)?;
        }

        if let Some(new_parent) = new_parent {
            let mut updated = new_parent.clone();
            if updated.attach_child(child_id) {
                updated.touch(now);
                journal.write(&new_parent, &updated)?;
            }
        }

        let written = journal.commit();
        debug!(
            "event=reparent module=index status=ok child_id={child_id} parent_id={} records_written={written}",
            new_parent_id.map_or_else(|| "root".to_string(), |id| id.to_string())
        );
        Ok(EdgeChange::Applied)
    }

    /// Removes every edge touching `node_id` from the rest of the graph.
    ///
    /// Children are orphaned (their `parent` is cleared), never deleted. The
    /// node's own edge fields are emptied as well.
    pub fn excise(&self, node_id: NodeId) -> GraphResult<ExciseReport> {
        let node = self.repo.load_node(node_id)?;
        let mut journal = WriteJournal::new(&self.repo);
        let report = self.excise_into(&node, &mut journal)?;
        journal.commit();
        Ok(report)
    }

    /// Excises `node_id` and deletes its record as one unit.
    pub fn remove_node(&self, node_id: NodeId) -> GraphResult<ExciseReport> {
        let node = self.repo.load_node(node_id)?;
        let mut journal = WriteJournal::new(&self.repo);
        let report = self.excise_into(&node, &mut journal)?;
        self.repo.delete_node(node_id)?;
        journal.commit();
        Ok(report)
    }

    fn excise_into(
        &self,
        node: &Node,
        journal: &mut WriteJournal<'_, R>,
    ) -> GraphResult<ExciseReport> {
        let node_id = node.id;
        let neighbours = self
            .repo
            .scan_nodes(&mut |candidate| candidate.id != node_id && candidate.mentions(node_id))?;

        let now = now_epoch_ms();
        let mut report = ExciseReport::default();
        for neighbour in neighbours {
            let mut updated = neighbour.clone();
            if updated.unlink_outgoing(node_id) {
                report.inbound_edges_removed += 1;
            }
            if updated.unlink_incoming(node_id) {
                report.outbound_edges_removed += 1;
            }
            if updated.detach_child(node_id) {
                report.detached_from_parent = true;
            }
            if updated.parent == Some(node_id) {
                updated.parent = None;
                report.orphaned_children += 1;
            }
            updated.touch(now);
            journal.write(&neighbour, &updated)?;
        }

        let mut cleared = node.clone();
        cleared.parent = None;
        cleared.children.clear();
        cleared.references.clear();
        cleared.referenced_by.clear();
        if cleared != *node {
            cleared.touch(now);
            journal.write(node, &cleared)?;
        }

        report.records_written = journal.len();
        debug!(
            "event=excise module=index status=ok node_id={node_id} inbound={} outbound={} orphaned={} records_written={}",
            report.inbound_edges_removed,
            report.outbound_edges_removed,
            report.orphaned_children,
            report.records_written
        );
        Ok(report)
    }

    /// Walks parent pointers from `candidate_parent` up to the root.
    fn ensure_not_descendant(&self, node_id: NodeId, candidate_parent: &Node) -> GraphResult<()> {
        let cycle = || GraphError::Cycle {
            node: node_id,
            parent: candidate_parent.id,
        };

        let mut visited = HashSet::from([candidate_parent.id]);
        let mut cursor = candidate_parent.parent;
        while let Some(current) = cursor {
            if current == node_id || !visited.insert(current) {
                return Err(cycle());
            }
            cursor = match self.repo.get_node(current)? {
                Some(ancestor) => ancestor.parent,
                None => None,
            };
        }
        Ok(())
    }

    fn rewrite_single(
        &self,
        node: &Node,
        mutate: impl FnOnce(&mut Node) -> bool,
    ) -> GraphResult<EdgeChange> {
        let mut updated = node.clone();
        if !mutate(&mut updated) {
            return Ok(EdgeChange::Unchanged);
        }
        updated.touch(now_epoch_ms());
        self.repo.put_node(&updated)?;
        Ok(EdgeChange::Applied)
    }
}
