use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::config::DatabaseConfiguration;
use crate::storage::StateKey;

pub(crate) struct DbQuery {
    pub(crate) connection: Connection,
}

impl DbQuery {
    pub(crate) fn open(db_conf: &DatabaseConfiguration, flags: OpenFlags) -> anyhow::Result<Self> {
        let connection = Connection::open_with_flags(&db_conf.sqlite_path, flags)?;
        Ok(Self { connection })
    }

    pub(crate) fn get_block(&self, block_id: &BlockId) -> anyhow::Result<Option<Block>> {
        log::trace!("Getting block by id: {}", block_id);

        let mut stmt = self
            .connection
            .prepare_cached("SELECT block FROM blocks WHERE block_id = ?1")?;
        let block = stmt
            .query_row(params![block_id.to_string()], Self::map_block())
            .optional()?;

        if block.is_none() {
            log::trace!("Block not found: {}", block_id);
        }
        Ok(block)
    }

    pub(crate) fn get_blocks(&self) -> anyhow::Result<Vec<Block>> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT block FROM blocks ORDER BY depth")?;
        let blocks = stmt
            .query_map(params![], Self::map_block())?
            .collect::<Result<Vec<_>, _>>()?;
        log::trace!("Loaded {} blocks", blocks.len());
        Ok(blocks)
    }

    pub(crate) fn get_value(&self, key: StateKey) -> anyhow::Result<Option<Vec<u8>>> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT value FROM state WHERE key = ?1")?;
        let value = stmt
            .query_row(params![key.as_str()], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn map_block() -> impl FnMut(&Row) -> Result<Block, rusqlite::Error> {
        |row| {
            let body: Vec<u8> = row.get(0)?;
            let block = serde_json::from_slice::<Block>(&body).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    body.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(e),
                )
            })?;
            Ok(block)
        }
    }
}
