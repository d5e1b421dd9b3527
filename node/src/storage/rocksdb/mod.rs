use std::sync::Arc;

use log::info;
use rocksdb::DB;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::config::DatabaseConfiguration;
use crate::storage::rocksdb::query::DbQuery;
use crate::storage::rocksdb::store::DbStore;
use crate::storage::{PiChainDatabase, StateKey};

pub(crate) mod query;
pub(crate) mod store;

pub(crate) struct RocksDbStorage {
    pub(crate) db_store: DbStore,
    pub(crate) db_query: DbQuery,
}

const PREFIX_BLOCK: &str = "block";
const PREFIX_STATE: &str = "state";

impl RocksDbStorage {
    pub(crate) fn open(db_conf: DatabaseConfiguration) -> anyhow::Result<Self> {
        info!("Opening RocksDB database at {}", db_conf.rocksdb_path);

        let mut options = rocksdb::Options::default();
        options.create_if_missing(db_conf.create_if_not_exists);

        let db = Arc::new(DB::open(&options, db_conf.rocksdb_path.clone())?);
        let db_store = DbStore::new(db.clone());
        let db_query = DbQuery::new(db);

        info!("Opened RocksDB database at {}", db_conf.rocksdb_path);
        Ok(Self { db_store, db_query })
    }
}

impl PiChainDatabase for RocksDbStorage {
    fn get_block(&self, block_id: &BlockId) -> anyhow::Result<Option<Block>> {
        self.db_query.get_block(block_id)
    }

    fn get_blocks(&self) -> anyhow::Result<Vec<Block>> {
        self.db_query.get_blocks()
    }

    fn store_block(&mut self, block: &Block) -> anyhow::Result<()> {
        self.db_store.store_block(block)
    }

    fn delete_block(&mut self, block_id: &BlockId) -> anyhow::Result<()> {
        self.db_store.delete(block_key(block_id))
    }

    fn get_value(&self, key: StateKey) -> anyhow::Result<Option<Vec<u8>>> {
        self.db_query.get(state_key(key))
    }

    fn put_value(&mut self, key: StateKey, value: &[u8]) -> anyhow::Result<()> {
        self.db_store.put(state_key(key), value)
    }

    fn delete_value(&mut self, key: StateKey) -> anyhow::Result<()> {
        self.db_store.delete(state_key(key))
    }

    fn compact(&mut self) -> anyhow::Result<()> {
        self.db_store.compact();
        Ok(())
    }
}

fn block_key(block_id: &BlockId) -> String {
    format!("{PREFIX_BLOCK}:{block_id}")
}

fn block_prefix() -> String {
    format!("{PREFIX_BLOCK}:")
}

fn state_key(key: StateKey) -> String {
    format!("{PREFIX_STATE}:{}", key.as_str())
}
