use std::cmp::Ordering;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::block::types::id::{BlockId, NodeId};
use crate::block::types::transaction::Transaction;
use crate::consensus::role::Role;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct Block {
    pub(crate) id: BlockId,
    /// `None` only for the genesis block.
    pub(crate) parent: Option<BlockId>,
    pub(crate) creator: NodeId,
    /// Role of the creator right after it created the block.
    pub(crate) creator_role: Role,
    pub(crate) txs: Vec<Transaction>,
    /// Parent depth plus the number of transactions. Set once when the block is created.
    pub(crate) depth: u64,
}

impl Block {
    pub(crate) fn new(
        id: BlockId,
        parent: &Block,
        creator_role: Role,
        txs: Vec<Transaction>,
    ) -> Self {
        let depth = parent.depth + txs.len() as u64;
        Self {
            id,
            parent: Some(parent.id),
            creator: id.creator,
            creator_role,
            txs,
            depth,
        }
    }

    pub(crate) fn genesis() -> Self {
        Self {
            id: BlockId::GENESIS,
            parent: None,
            creator: BlockId::GENESIS.creator,
            creator_role: Role::Slow,
            txs: vec![],
            depth: 0,
        }
    }

    pub(crate) fn commands(&self) -> Vec<Vec<u8>> {
        self.txs.iter().map(|tx| tx.payload.clone()).collect()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deeper blocks are greater. Equal depths are ordered by creator and then by identifier.
impl Ord for Block {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| self.creator.cmp(&other.creator))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parent = self
            .parent
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "block {} (parent: {parent}, depth: {}, creator: {} {:?}, txs: {})",
            self.id,
            self.depth,
            self.creator,
            self.creator_role,
            self.txs.len()
        )
    }
}
