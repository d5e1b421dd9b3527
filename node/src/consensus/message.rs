use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::block::types::block::Block;
use crate::block::types::id::{BlockId, NodeId};
use crate::block::types::transaction::Transaction;

/// The voting messages. Every message carries the sequence number of the round it belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) enum PaxosMessage {
    /// First round request, sent by the proposer to everybody.
    Try {
        request_seq: u64,
        last_committed_block: BlockId,
        new_block: BlockId,
    },
    /// Answer to `Try`, carries whatever the voter accepted in an earlier second round.
    TryOk {
        request_seq: u64,
        voter: NodeId,
        proposal_block: Option<BlockId>,
        support_block: Option<BlockId>,
    },
    /// Second round request. `new_block` is `None` when the proposer skipped the first round.
    Propose {
        request_seq: u64,
        com_block: BlockId,
        new_block: Option<BlockId>,
    },
    ProposeAck {
        request_seq: u64,
        voter: NodeId,
        com_block: BlockId,
    },
    Commit {
        request_seq: u64,
        com_block: BlockId,
    },
}

impl PaxosMessage {
    pub(crate) fn request_seq(&self) -> u64 {
        match self {
            PaxosMessage::Try { request_seq, .. }
            | PaxosMessage::TryOk { request_seq, .. }
            | PaxosMessage::Propose { request_seq, .. }
            | PaxosMessage::ProposeAck { request_seq, .. }
            | PaxosMessage::Commit { request_seq, .. } => *request_seq,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            PaxosMessage::Try { .. } => "TRY",
            PaxosMessage::TryOk { .. } => "TRY_OK",
            PaxosMessage::Propose { .. } => "PROPOSE",
            PaxosMessage::ProposeAck { .. } => "PROPOSE_ACK",
            PaxosMessage::Commit { .. } => "COMMIT",
        }
    }
}

impl Display for PaxosMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(seq: {})", self.kind(), self.request_seq())
    }
}

/// Everything nodes send to each other.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) enum NodeMessage {
    Paxos(PaxosMessage),
    Transaction(Transaction),
    Block(Block),
    RequestBlocks { block_id: BlockId },
    /// The requested block followed by some of its ancestors.
    RespondBlocks { blocks: Vec<Block> },
    AckCommit { block_id: BlockId, node: NodeId },
}

impl Display for NodeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeMessage::Paxos(message) => write!(f, "{message}"),
            NodeMessage::Transaction(tx) => write!(f, "TXN({})", tx.id),
            NodeMessage::Block(block) => write!(f, "BLK({})", block.id),
            NodeMessage::RequestBlocks { block_id } => write!(f, "RQB({block_id})"),
            NodeMessage::RespondBlocks { blocks } => write!(f, "RSB({} blocks)", blocks.len()),
            NodeMessage::AckCommit { block_id, node } => write!(f, "ACM({block_id} from {node})"),
        }
    }
}
