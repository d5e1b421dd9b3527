use std::sync::Arc;

use log::trace;
use rocksdb::DB;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::storage::rocksdb::{block_key, block_prefix};

pub(crate) struct DbQuery {
    database: Arc<DB>,
}

impl DbQuery {
    pub(crate) fn new(db: Arc<DB>) -> DbQuery {
        DbQuery { database: db }
    }

    pub(crate) fn get_block(&self, block_id: &BlockId) -> anyhow::Result<Option<Block>> {
        trace!("Getting block by id: {}", block_id);

        let block = if let Some(block) = self.database.get(block_key(block_id))? {
            Some(serde_json::from_slice::<Block>(&block)?)
        } else {
            trace!("Didn't find block");
            None
        };
        Ok(block)
    }

    pub(crate) fn get_blocks(&self) -> anyhow::Result<Vec<Block>> {
        let prefix = block_prefix();
        let mut blocks = vec![];
        for item in self.database.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = item?;
            //prefix_iterator only seeks, it keeps going past the prefix
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            blocks.push(serde_json::from_slice::<Block>(&value)?);
        }
        trace!("Loaded {} blocks", blocks.len());
        Ok(blocks)
    }

    pub(crate) fn get(&self, key: String) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.database.get(key)?)
    }
}
