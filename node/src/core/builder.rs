use std::sync::Arc;

use anyhow::anyhow;
use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    api::{application::Application, http, ApiListener, PiChainExternalApi},
    block::tree::Blocktree,
    config::Configuration,
    consensus::{node::Node, timer::ChannelTimers},
    core::{
        pichain::PiChain,
        shutdown::{Shutdown, ShutdownHandle, ShutdownManager},
    },
    logging::pretty_json,
    network::{tcp::TcpNetwork, ChannelTransport, NetworkEvent},
    storage::{memory::MemoryStorage, PiChainDatabase},
};

#[cfg(feature = "rocksdb_storage")]
use crate::storage::rocksdb::RocksDbStorage;
#[cfg(feature = "sqlite_storage")]
use crate::storage::sqlite::SqliteStorage;

#[derive(Clone)]
pub struct PiChainHandle {
    /// piChain API
    pub api: PiChainExternalApi,
    /// piChain shutdown handle
    pub shutdown: ShutdownHandle,
}

pub struct PiChainStarter<A: Application> {
    config: Configuration,
    application: Option<A>,
    ephemeral: bool,
    storage: Option<Box<dyn PiChainDatabase>>,
    from_network: Option<mpsc::UnboundedReceiver<NetworkEvent>>,
    transport: Option<ChannelTransport>,
    api_listener: ApiListener,
    api: PiChainExternalApi,
}

impl<A> PiChainStarter<A>
where
    A: Application + 'static,
{
    //Crate pure data structures, no resource allocation nor threads
    pub fn new(config: Configuration) -> anyhow::Result<Self> {
        info!("Node configuration: {}", pretty_json(&config));
        let (api, api_listener) = PiChainExternalApi::new();
        let builder = PiChainStarter {
            config,
            application: None,
            ephemeral: false,
            storage: None,
            from_network: None,
            transport: None,
            api_listener,
            api,
        };
        Ok(builder)
    }

    pub fn with_application(self, application: A) -> PiChainStarter<A> {
        Self {
            application: Some(application),
            ..self
        }
    }

    /// Keeps all state in memory, nothing survives a restart.
    pub fn ephemeral(self) -> Self {
        Self {
            ephemeral: true,
            ..self
        }
    }

    //opens database, binds sockets and spawns dependent tasks
    pub async fn init_tasks(self) -> anyhow::Result<PiChain<A>> {
        info!("Initializing piChain tasks...");
        let mut starter = if self.ephemeral {
            self.connect_memory()
        } else {
            self.connect_database().await?
        };

        let (mut shutdown_manager, shutdown_handle) = ShutdownManager::init();
        starter.start_tasks(&mut shutdown_manager).await?;
        starter.pichain(shutdown_handle, shutdown_manager)
    }

    async fn start_tasks(&mut self, shutdown_manager: &mut ShutdownManager) -> anyhow::Result<()> {
        info!("Starting network...");
        match self.start_network(shutdown_manager.subscribe()).await {
            Ok(nw_task) => {
                shutdown_manager.add_handle(nw_task);
            }
            Err(err) => {
                error!("Failed to start network: {}", err);
                return Err(err);
            }
        }

        info!("Starting http server...");
        match self.start_http(shutdown_manager.subscribe()) {
            Ok(http_task) => {
                shutdown_manager.add_handle(http_task);
            }
            Err(err) => {
                error!("Failed to start http server: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn start_http(&mut self, mut shutdown: Shutdown) -> anyhow::Result<JoinHandle<()>> {
        let http = http::init(&self.config, self.api.clone())?;

        let join_handle = tokio::spawn(async move {
            let server_handle = http.handle();

            tokio::select! {
                _ = shutdown.shutdown_signal_rcv.recv() => {
                    info!("Shutting down http server");
                    server_handle.stop(true).await;
                }
                http_stopped = http => {
                    match http_stopped {
                        Ok(_) => info!("Http server stopped unexpectedly"),
                        Err(e) => error!("Http server stopped with error: {}", e),
                    }
                }
            }
            info!("Http task finished");
        });
        Ok(join_handle)
    }

    async fn start_network(&mut self, mut shutdown: Shutdown) -> anyhow::Result<JoinHandle<()>> {
        let (mut network, from_network, transport) = TcpNetwork::from_config(&self.config);
        self.from_network = Some(from_network);
        self.transport = Some(transport);

        network.bind().await?;
        let join_handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.shutdown_signal_rcv.recv() => {
                    info!("Shutting down network");
                }
                nw_stopped = network.run() => {
                    match nw_stopped {
                        Ok(_) => info!("Network stopped"),
                        Err(e) => error!("Network stopped with error: {e}"),
                    }
                }
            }
            info!("Network task finished");
        });
        Ok(join_handle)
    }

    fn pichain(
        mut self,
        shutdown_handle: ShutdownHandle,
        shutdown_manager: ShutdownManager,
    ) -> anyhow::Result<PiChain<A>> {
        let application = self
            .application
            .take()
            .ok_or_else(|| anyhow!("Application is not set"))?;
        let storage = self
            .storage
            .take()
            .ok_or_else(|| anyhow!("Database connection is not initialized"))?;
        let from_network = self
            .from_network
            .take()
            .ok_or_else(|| anyhow!("Network is not started"))?;
        let transport = self
            .transport
            .take()
            .ok_or_else(|| anyhow!("Network is not started"))?;

        let tree = Blocktree::open(storage)?;
        let (timers, timer_commands) = ChannelTimers::new();
        let node = Node::new(
            self.config.node_id(),
            self.config.cluster_size(),
            self.config.consensus.clone(),
            tree,
            Box::new(transport),
            Box::new(timers),
            Arc::new(application),
        )?;

        let pichain_handle = PiChainHandle {
            api: self.api,
            shutdown: shutdown_handle,
        };
        Ok(PiChain::new(
            node,
            from_network,
            timer_commands,
            self.api_listener,
            pichain_handle,
            shutdown_manager,
        ))
    }

    fn connect_memory(mut self) -> Self {
        info!("Using in-memory storage");
        self.storage = Some(Box::new(MemoryStorage::new()));
        self
    }

    //allocate database connection
    async fn connect_database(self) -> anyhow::Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "sqlite_storage")] {
                let starter = self.connect_sqlite().await?;
            } else if #[cfg(feature = "rocksdb_storage")] {
                let starter = self.connect_rocksdb().await?;
            } else {
                compile_error!("Must enable either sqlite or rocksdb feature");
            }
        };
        Ok(starter)
    }

    #[cfg(feature = "rocksdb_storage")]
    async fn connect_rocksdb(mut self) -> anyhow::Result<Self> {
        info!("Opening database...");
        let database = RocksDbStorage::open(self.config.storage.clone())?;
        self.storage = Some(Box::new(database));
        Ok(self)
    }

    #[cfg(feature = "sqlite_storage")]
    async fn connect_sqlite(mut self) -> anyhow::Result<Self> {
        info!("Opening database...");
        let database = SqliteStorage::open(self.config.storage.clone())?;
        self.storage = Some(Box::new(database));
        Ok(self)
    }
}
