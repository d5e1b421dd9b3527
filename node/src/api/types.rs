//! # Api Types
//!
//! Public versions of the block and status types used internally.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::block::types::block::Block;
use crate::block::types::transaction::Transaction;
use crate::consensus::node::NodeStatus;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiTransaction {
    /// `creator:counter`
    pub id: String,
    pub creator: u32,
    pub payload: Vec<u8>,
}

impl From<&Transaction> for ApiTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            creator: tx.creator().0,
            payload: tx.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiBlock {
    /// `creator-counter`, or `genesis`
    pub id: String,
    pub parent: Option<String>,
    pub creator: u32,
    /// Role of the creator when it created the block
    pub creator_role: String,
    /// Number of transactions from genesis up to and including this block
    pub depth: u64,
    pub transactions: Vec<ApiTransaction>,
}

impl From<&Block> for ApiBlock {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.to_string(),
            parent: block.parent.map(|parent| parent.to_string()),
            creator: block.creator.0,
            creator_role: format!("{:?}", block.creator_role),
            depth: block.depth,
            transactions: block.txs.iter().map(ApiTransaction::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiNodeStatus {
    pub node: u32,
    pub role: String,
    pub head: String,
    pub head_depth: u64,
    pub committed: String,
    pub committed_depth: u64,
    pub genesis: String,
    /// Blocks currently held in the block tree
    pub blocks: usize,
    /// Transactions waiting for a block
    pub pending_transactions: usize,
    /// Seconds
    pub expected_rtt: f64,
    pub commit_running: bool,
}

impl From<NodeStatus> for ApiNodeStatus {
    fn from(status: NodeStatus) -> Self {
        Self {
            node: status.node.0,
            role: format!("{:?}", status.role),
            head: status.head.to_string(),
            head_depth: status.head_depth,
            committed: status.committed.to_string(),
            committed_depth: status.committed_depth,
            genesis: status.genesis.to_string(),
            blocks: status.blocks,
            pending_transactions: status.pending_transactions,
            expected_rtt: status.expected_rtt,
            commit_running: status.commit_running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiSubmitRequest {
    pub command: Vec<u8>,
}

impl ApiSubmitRequest {
    pub fn new(command: Vec<u8>) -> Self {
        Self { command }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiSubmitResponse {
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ApiCommitted {
    /// Committed block ids in commit order
    pub blocks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct Health {
    pub status: String,
}
