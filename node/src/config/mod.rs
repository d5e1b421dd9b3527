//! Node configuration.
//!
//! A configuration file describes the local node, the whole cluster (including the local node),
//! the consensus timing parameters, the storage location and the HTTP port.
//!
//! # Example
//!
//! ```toml
//! [node]
//! ip = "127.0.0.1"
//! port = 4000
//! node_index = 0
//!
//! [[peers]]
//! node_index = 0
//! address = "127.0.0.1:4000"
//!
//! [[peers]]
//! node_index = 1
//! address = "127.0.0.1:4001"
//!
//! [consensus]
//! accumulation_time_ms = 100
//! max_commit_time_ms = 200
//! max_txn_count = 5000
//! recovery_blocks_count = 5
//! ping_interval_ms = 1000
//!
//! [storage]
//! sqlite_path = "/home/user/.pichain/n0/db/pichain.sqlite"
//! rocksdb_path = "/home/user/.pichain/n0/db/rocksdb"
//! create_if_not_exists = true
//!
//! [http]
//! port = 7000
//! ```
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::types::id::NodeId;

const PICHAIN_ROOT_DIR: &str = ".pichain";
const PICHAIN_CONFIG_FILE: &str = "pichain.toml";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration file does not exist: '{0}'")]
    NotFound(String),
    #[error("Configuration file is invalid: {0}")]
    Parsing(#[from] config::ConfigError),
    #[error("Failed to serialize configuration: {0}")]
    Serialization(#[from] toml::ser::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub node: NodeConfiguration,
    pub peers: Vec<PeerSetting>,
    pub consensus: ConsensusConfiguration,
    pub storage: DatabaseConfiguration,
    pub http: HttpConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    pub ip: String,
    /// Port of the node to node protocol.
    pub port: u16,
    /// Index of this node in the cluster, node 0 starts as the eager proposer.
    pub node_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSetting {
    pub node_index: u32,
    /// `ip:port` of the peer's protocol listener.
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfiguration {
    /// Added to every patience so that transactions arriving together end up in one block.
    pub accumulation_time_ms: u64,
    /// Time a voting attempt may take on top of two round trips before it is abandoned.
    pub max_commit_time_ms: u64,
    /// Maximum number of transactions in a single block.
    pub max_txn_count: usize,
    /// Number of ancestors sent along with a requested block.
    pub recovery_blocks_count: usize,
    pub ping_interval_ms: u64,
}

impl ConsensusConfiguration {
    pub(crate) fn accumulation_time(&self) -> Duration {
        Duration::from_millis(self.accumulation_time_ms)
    }

    pub(crate) fn max_commit_time(&self) -> Duration {
        Duration::from_millis(self.max_commit_time_ms)
    }

    pub(crate) fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

impl Default for ConsensusConfiguration {
    fn default() -> Self {
        Self {
            accumulation_time_ms: 100,
            max_commit_time_ms: 200,
            max_txn_count: 5000,
            recovery_blocks_count: 5,
            ping_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfiguration {
    pub sqlite_path: String,
    pub rocksdb_path: String,
    pub create_if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfiguration {
    pub port: u16,
}

impl Configuration {
    pub fn try_load<I: Into<PathBuf>>(path: I) -> Result<Configuration> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigurationError::NotFound(path.display().to_string()));
        }
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let configuration: Configuration = config.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn try_load_from_home_dir(node_name: &str) -> Result<Configuration> {
        let path = Self::config_file_path(node_name)?;
        Self::try_load(path)
    }

    pub fn try_write<I: Into<PathBuf>>(&self, path: I) -> Result<()> {
        let path = path.into();
        let config = toml::to_string(&self)?;
        let config = format!(
            "{}\n\n{}",
            "#This file is generated by pichain init and can be edited by hand.", config
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&path)?;
        file.write_all(config.as_bytes())?;
        Ok(())
    }

    pub fn try_write_home_dir(&self, node_name: &str) -> Result<()> {
        let path = Self::config_file_path(node_name)?;
        self.try_write(path)
    }

    pub fn pichain_root_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(PICHAIN_ROOT_DIR))
            .ok_or_else(|| ConfigurationError::Other("Could not find home directory".to_string()))
    }

    pub fn node_dir(node_name: &str) -> Result<PathBuf> {
        Ok(Self::pichain_root_dir()?.join(node_name))
    }

    pub fn config_file_path(node_name: &str) -> Result<PathBuf> {
        Ok(Self::node_dir(node_name)?.join(PICHAIN_CONFIG_FILE))
    }

    pub(crate) fn node_id(&self) -> NodeId {
        NodeId::from(self.node.node_index)
    }

    /// Number of nodes in the cluster, the local node included.
    pub(crate) fn cluster_size(&self) -> usize {
        self.peers.len()
    }

    /// All peers except the local node.
    pub(crate) fn remote_peers(&self) -> Vec<PeerSetting> {
        self.peers
            .iter()
            .filter(|peer| peer.node_index != self.node.node_index)
            .cloned()
            .collect()
    }

    pub(crate) fn protocol_address(&self) -> String {
        format!("{}:{}", self.node.ip, self.node.port)
    }

    pub(crate) fn http_address(&self) -> String {
        format!("http://{}:{}", self.node.ip, self.http.port)
    }

    fn validate(&self) -> Result<()> {
        if !self
            .peers
            .iter()
            .any(|peer| peer.node_index == self.node.node_index)
        {
            return Err(ConfigurationError::Other(format!(
                "Peers list must contain the local node {}",
                self.node.node_index
            )));
        }
        let mut indexes = self.peers.iter().map(|p| p.node_index).collect::<Vec<_>>();
        indexes.sort_unstable();
        indexes.dedup();
        if indexes.len() != self.peers.len() {
            return Err(ConfigurationError::Other(
                "Peers list contains duplicate node indexes".to_string(),
            ));
        }
        if self.consensus.max_txn_count == 0 {
            return Err(ConfigurationError::Other(
                "max_txn_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
