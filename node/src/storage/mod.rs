//! Durable state of a node.
//!
//! Blocks are stored by id, everything else is a named scalar (see [`StateKey`]) holding a JSON
//! encoded value. The blocktree mirrors every mutation here before it acts on it, so a restarted
//! node finds exactly what it had promised before the crash.
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::utilities::encoding;

pub(crate) mod memory;
#[cfg(feature = "rocksdb_storage")]
pub(crate) mod rocksdb;
#[cfg(feature = "sqlite_storage")]
pub(crate) mod sqlite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StateKey {
    HeadBlock,
    CommittedBlock,
    CommittedBlocks,
    MaxBlockDepth,
    ProposalBlock,
    SupportBlock,
    Counter,
    Genesis,
}

impl StateKey {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            StateKey::HeadBlock => "head_block",
            StateKey::CommittedBlock => "committed_block",
            StateKey::CommittedBlocks => "committed_blocks",
            StateKey::MaxBlockDepth => "s_max_block_depth",
            StateKey::ProposalBlock => "s_prop_block",
            StateKey::SupportBlock => "s_supp_block",
            StateKey::Counter => "counter",
            StateKey::Genesis => "genesis",
        }
    }
}

pub(crate) trait PiChainDatabase: Send {
    fn get_block(&self, block_id: &BlockId) -> anyhow::Result<Option<Block>>;

    /// All stored blocks, in no particular order.
    fn get_blocks(&self) -> anyhow::Result<Vec<Block>>;

    /// Storing a block that already exists is a no-op.
    fn store_block(&mut self, block: &Block) -> anyhow::Result<()>;

    fn delete_block(&mut self, block_id: &BlockId) -> anyhow::Result<()>;

    fn get_value(&self, key: StateKey) -> anyhow::Result<Option<Vec<u8>>>;

    fn put_value(&mut self, key: StateKey, value: &[u8]) -> anyhow::Result<()>;

    fn delete_value(&mut self, key: StateKey) -> anyhow::Result<()>;

    /// Reclaims the space of deleted entries.
    fn compact(&mut self) -> anyhow::Result<()>;
}

pub(crate) fn load<T: DeserializeOwned>(
    db: &dyn PiChainDatabase,
    key: StateKey,
) -> anyhow::Result<Option<T>> {
    match db.get_value(key)? {
        Some(bytes) => Ok(Some(encoding::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn store<T: Serialize>(
    db: &mut dyn PiChainDatabase,
    key: StateKey,
    value: &T,
) -> anyhow::Result<()> {
    let bytes = encoding::encode(value)?;
    db.put_value(key, &bytes)
}
