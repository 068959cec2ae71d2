//! Write journal giving multi-record index operations all-or-nothing effect.
//!
//! Every overwrite first records the prior version of the record. Dropping
//! an uncommitted journal writes those snapshots back in reverse order, so a
//! failure midway (a failed write, a failed lookup after some writes, an
//! early `?` return) restores the pre-call state even on stores without
//! multi-key transactions.

use crate::model::node::Node;
use crate::repo::node_repo::NodeRepository;
use crate::repo::RepoResult;
use log::error;

pub(crate) struct WriteJournal<'r, R: NodeRepository> {
    repo: &'r R,
    snapshots: Vec<Node>,
    committed: bool,
}

impl<'r, R: NodeRepository> WriteJournal<'r, R> {
    pub(crate) fn new(repo: &'r R) -> Self {
        Self {
            repo,
            snapshots: Vec::new(),
            committed: false,
        }
    }

    /// Persists `after`, remembering `before` for compensation.
    pub(crate) fn write(&mut self, before: &Node, after: &Node) -> RepoResult<()> {
        self.repo.put_node(after)?;
        self.snapshots.push(before.clone());
        Ok(())
    }

    /// Number of records written so far.
    pub(crate) fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Keeps all writes; the journal becomes inert.
    pub(crate) fn commit(mut self) -> usize {
        self.committed = true;
        self.snapshots.len()
    }

    fn compensate(&mut self) {
        while let Some(snapshot) = self.snapshots.pop() {
            if let Err(err) = self.repo.put_node(&snapshot) {
                error!(
                    "event=index_compensate module=index status=error node_id={} error={}",
                    snapshot.id, err
                );
            }
        }
    }
}

impl<R: NodeRepository> Drop for WriteJournal<'_, R> {
    fn drop(&mut self) {
        if !self.committed && !self.snapshots.is_empty() {
            self.compensate();
        }
    }
}
