use anyhow::Result;
use rusqlite::{params, Connection};

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::storage::StateKey;

pub(crate) struct DbStore {
    connection: Connection,
}

impl DbStore {
    pub(crate) fn new(connection: Connection) -> DbStore {
        DbStore { connection }
    }

    pub(crate) fn store_block(&mut self, block: &Block) -> Result<()> {
        log::trace!("Storing block: {}", block);

        let id = block.id.to_string();
        let depth = block.depth as i64;
        let block_bytes = serde_json::to_vec::<Block>(block).map_err(|e| anyhow::anyhow!(e))?;

        let mut statement = self.connection.prepare_cached(
            "INSERT OR IGNORE INTO blocks (block_id, depth, block) VALUES (?1, ?2, ?3)",
        )?;
        statement.execute(params![&id, &depth, &block_bytes])?;
        Ok(())
    }

    pub(crate) fn delete_block(&mut self, block_id: &BlockId) -> Result<()> {
        log::trace!("Deleting block: {}", block_id);

        let mut statement = self
            .connection
            .prepare_cached("DELETE FROM blocks WHERE block_id = ?1")?;
        statement.execute(params![block_id.to_string()])?;
        Ok(())
    }

    pub(crate) fn put_value(&mut self, key: StateKey, value: &[u8]) -> Result<()> {
        let mut statement = self.connection.prepare_cached(
            "INSERT INTO state (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )?;
        statement.execute(params![key.as_str(), value])?;
        Ok(())
    }

    pub(crate) fn delete_value(&mut self, key: StateKey) -> Result<()> {
        let mut statement = self
            .connection
            .prepare_cached("DELETE FROM state WHERE key = ?1")?;
        statement.execute(params![key.as_str()])?;
        Ok(())
    }

    pub(crate) fn vacuum(&mut self) -> Result<()> {
        log::debug!("Compacting database");
        self.connection.execute_batch("VACUUM")?;
        Ok(())
    }
}
