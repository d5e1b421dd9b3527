use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Index of a node in the cluster configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub(crate) struct NodeId(pub(crate) u32);

impl From<u32> for NodeId {
    fn from(index: u32) -> Self {
        NodeId(index)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blocks are identified by their creator and the creator's counter at creation time.
///
/// The counter is shared with transactions and persisted, so identifiers stay unique across
/// restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub(crate) struct BlockId {
    pub(crate) creator: NodeId,
    pub(crate) counter: u64,
}

impl BlockId {
    /// Identifier of the bootstrap genesis block, no node ever creates it.
    pub(crate) const GENESIS: BlockId = BlockId {
        creator: NodeId(u32::MAX),
        counter: 0,
    };

    pub(crate) fn new(creator: NodeId, counter: u64) -> Self {
        Self { creator, counter }
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == BlockId::GENESIS {
            write!(f, "genesis")
        } else {
            write!(f, "{}-{}", self.creator, self.counter)
        }
    }
}

impl FromStr for BlockId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "genesis" {
            return Ok(BlockId::GENESIS);
        }
        let (creator, counter) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid block id: {s}"))?;
        Ok(BlockId {
            creator: NodeId(creator.parse()?),
            counter: counter.parse()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub(crate) struct TransactionId {
    pub(crate) creator: NodeId,
    pub(crate) counter: u64,
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.creator, self.counter)
    }
}
