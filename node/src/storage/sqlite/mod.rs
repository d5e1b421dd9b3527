use rusqlite::Connection;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::config::DatabaseConfiguration;
use crate::storage::sqlite::query::DbQuery;
use crate::storage::sqlite::store::DbStore;
use crate::storage::{PiChainDatabase, StateKey};

pub(crate) mod query;
pub(crate) mod store;

mod migrations {
    use refinery::embed_migrations;

    embed_migrations!("migrations");
}

pub(crate) struct SqliteStorage {
    pub(crate) db_store: DbStore,
    pub(crate) db_query: DbQuery,
}

impl SqliteStorage {
    pub(crate) fn open(db_conf: DatabaseConfiguration) -> anyhow::Result<Self> {
        let mut flags = rusqlite::OpenFlags::default();
        if !db_conf.create_if_not_exists {
            flags.remove(rusqlite::OpenFlags::SQLITE_OPEN_CREATE);
        }

        let mut connection = Connection::open_with_flags(db_conf.sqlite_path.clone(), flags)?;
        Self::run_migrations(&mut connection)?;

        log::info!("Starting db backend with path: {}", db_conf.sqlite_path);
        let db_store = DbStore::new(connection);
        let db_query = DbQuery::open(&db_conf, flags)?;
        Ok(Self { db_store, db_query })
    }

    pub(crate) fn run_migrations(connection: &mut Connection) -> anyhow::Result<()> {
        log::info!("Running database migrations");
        match migrations::migrations::runner().run(connection) {
            Ok(ok) => {
                log::info!("Database migrations completed:{:?} ", ok);
                Ok(())
            }
            Err(err) => {
                log::error!("Database migrations failed: {}", err);
                Err(anyhow::anyhow!(err))
            }
        }
    }
}

impl PiChainDatabase for SqliteStorage {
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
        self.db_store.delete_block(block_id)
    }

    fn get_value(&self, key: StateKey) -> anyhow::Result<Option<Vec<u8>>> {
        self.db_query.get_value(key)
    }

    fn put_value(&mut self, key: StateKey, value: &[u8]) -> anyhow::Result<()> {
        self.db_store.put_value(key, value)
    }

    fn delete_value(&mut self, key: StateKey) -> anyhow::Result<()> {
        self.db_store.delete_value(key)
    }

    fn compact(&mut self) -> anyhow::Result<()> {
        self.db_store.vacuum()
    }
}
