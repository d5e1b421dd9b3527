use std::sync::Arc;

use rocksdb::DB;

use crate::block::types::block::Block;
use crate::storage::rocksdb::block_key;

pub(crate) struct DbStore {
    connection: Arc<DB>,
}

impl DbStore {
    pub(crate) fn new(db: Arc<DB>) -> DbStore {
        DbStore { connection: db }
    }

    pub(crate) fn store_block(&self, block: &Block) -> anyhow::Result<()> {
        let key = block_key(&block.id);
        log::trace!("Storing block under key: {}", key);

        if self.connection.get_pinned(&key)?.is_some() {
            return Ok(());
        }
        let block_bytes = serde_json::to_vec::<Block>(block)?;
        self.connection.put(key.as_bytes(), block_bytes)?;
        Ok(())
    }

    pub(crate) fn put(&self, key: String, value: &[u8]) -> anyhow::Result<()> {
        self.connection.put(key.as_bytes(), value)?;
        Ok(())
    }

    pub(crate) fn delete(&self, key: String) -> anyhow::Result<()> {
        self.connection.delete(key.as_bytes())?;
        Ok(())
    }

    pub(crate) fn compact(&self) {
        log::debug!("Compacting database");
        self.connection.compact_range::<&[u8], &[u8]>(None, None);
    }
}
