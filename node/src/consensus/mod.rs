//! # piChain consensus
//!
//! Every node runs the same state machine ([`node::Node`]). Transactions are buffered until the
//! node's patience runs out, then they are batched into a block on top of the current head. A node
//! in the `Fast` role tries to commit its block with two voting rounds:
//!
//! 1. `TRY` asks everybody to promise not to accept shallower proposals. The answers (`TRY_OK`)
//!    report any block the voter already accepted in a second round, the proposer continues with the
//!    one that has the deepest support.
//! 2. `PROPOSE` asks everybody to accept the compromise block. Once a majority answered with
//!    `PROPOSE_ACK`, the proposer broadcasts `COMMIT`.
//!
//! A proposer that just committed may skip the first round for its next block as long as nobody
//! else started a round in between.
//!
//! Nodes adapt their role from what they observe: creating a block promotes, seeing a deeper head
//! or a block created by a `Fast` node demotes to `Slow`. The patience of a role is derived from
//! the measured round trip times, so that normally a single node proposes.
use thiserror::Error;

use crate::block::types::id::BlockId;

pub(crate) mod message;
pub(crate) mod node;
pub(crate) mod quorum;
pub(crate) mod role;
pub(crate) mod timer;

#[cfg(test)]
mod test;

#[derive(Error, Debug)]
pub(crate) enum ConsensusError {
    /// The committed chain is broken. The node can't continue without violating safety.
    #[error("Block {block} does not descend from the committed block {committed}")]
    InconsistentCommit { committed: BlockId, block: BlockId },
    #[error("ConsensusError::General: {0}")]
    General(#[from] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, ConsensusError>;
