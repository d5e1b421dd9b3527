use std::collections::HashMap;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::storage::{PiChainDatabase, StateKey};

/// Keeps everything in memory. Used by tests and by nodes which don't need to survive a restart.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    blocks: HashMap<BlockId, Block>,
    values: HashMap<StateKey, Vec<u8>>,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl PiChainDatabase for MemoryStorage {
    fn get_block(&self, block_id: &BlockId) -> anyhow::Result<Option<Block>> {
        Ok(self.blocks.get(block_id).cloned())
    }

    fn get_blocks(&self) -> anyhow::Result<Vec<Block>> {
        Ok(self.blocks.values().cloned().collect())
    }

    fn store_block(&mut self, block: &Block) -> anyhow::Result<()> {
        self.blocks.entry(block.id).or_insert_with(|| block.clone());
        Ok(())
    }

    fn delete_block(&mut self, block_id: &BlockId) -> anyhow::Result<()> {
        self.blocks.remove(block_id);
        Ok(())
    }

    fn get_value(&self, key: StateKey) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.values.get(&key).cloned())
    }

    fn put_value(&mut self, key: StateKey, value: &[u8]) -> anyhow::Result<()> {
        self.values.insert(key, value.to_vec());
        Ok(())
    }

    fn delete_value(&mut self, key: StateKey) -> anyhow::Result<()> {
        self.values.remove(&key);
        Ok(())
    }

    fn compact(&mut self) -> anyhow::Result<()> {
        self.blocks.shrink_to_fit();
        Ok(())
    }
}
