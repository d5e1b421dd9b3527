use std::collections::HashSet;

use crate::block::types::id::NodeId;

/// Strictly more than half of the cluster.
pub(crate) fn is_majority(count: usize, cluster_size: usize) -> bool {
    count * 2 > cluster_size
}

/// Votes of a single round, counted once per node.
#[derive(Debug, Default)]
pub(crate) struct VoteSet {
    voters: HashSet<NodeId>,
}

impl VoteSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns false if `voter` already voted.
    pub(crate) fn add(&mut self, voter: NodeId) -> bool {
        self.voters.insert(voter)
    }

    pub(crate) fn len(&self) -> usize {
        self.voters.len()
    }

    pub(crate) fn has_majority(&self, cluster_size: usize) -> bool {
        is_majority(self.voters.len(), cluster_size)
    }

    pub(crate) fn clear(&mut self) {
        self.voters.clear();
    }
}
