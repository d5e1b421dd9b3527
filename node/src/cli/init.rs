use anyhow::anyhow;
use clap::Parser;

use crate::config::{
    Configuration, ConsensusConfiguration, DatabaseConfiguration, HttpConfiguration,
    NodeConfiguration, PeerSetting,
};

//network settings
const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";
const DEFAULT_LISTEN_PORT: &str = "4000";
const DEFAULT_HTTP_PORT: &str = "7000";

#[derive(Debug, Clone, Parser)]
pub struct InitCmd {
    #[arg(long, default_value = "default")]
    pub node_name: String,
    #[clap(long, default_value_t = 0)]
    pub node_index: u32,
    #[clap(long, default_value = DEFAULT_LISTEN_ADDRESS)]
    pub ip: String,
    #[clap(long, default_value = DEFAULT_LISTEN_PORT)]
    pub port: u16,
    #[clap(long, default_value = DEFAULT_HTTP_PORT)]
    pub http_port: u16,
    /// Remote peers as `node_index@ip:port`, separated by commas
    #[clap(long, value_delimiter = ',')]
    pub peers: Vec<String>,
    #[clap(long, default_value_t = 100)]
    pub accumulation_time_ms: u64,
    #[clap(long, default_value_t = 200)]
    pub max_commit_time_ms: u64,
}

impl InitCmd {
    pub fn execute(self) -> anyhow::Result<()> {
        if Configuration::try_load_from_home_dir(&self.node_name).is_ok() {
            anyhow::bail!("Configuration file already exists: {}", self.node_name);
        }

        let path = Configuration::node_dir(&self.node_name)?;
        println!("Creating piChain node configuration in: {path:?}");

        let db_dir = path.join("db");
        let rocksdb_path = db_dir.join("rocksdb");
        let sqlite_path = db_dir.join("pichain.sqlite");
        std::fs::create_dir_all(&rocksdb_path)?;

        let mut peers = vec![PeerSetting {
            node_index: self.node_index,
            address: format!("{}:{}", self.ip, self.port),
        }];
        for peer in &self.peers {
            peers.push(parse_peer(peer)?);
        }

        let configuration = Configuration {
            node: NodeConfiguration {
                ip: self.ip,
                port: self.port,
                node_index: self.node_index,
            },
            peers,
            consensus: ConsensusConfiguration {
                accumulation_time_ms: self.accumulation_time_ms,
                max_commit_time_ms: self.max_commit_time_ms,
                ..ConsensusConfiguration::default()
            },
            storage: DatabaseConfiguration {
                rocksdb_path: rocksdb_path.display().to_string(),
                sqlite_path: sqlite_path.display().to_string(),
                create_if_not_exists: true,
            },
            http: HttpConfiguration {
                port: self.http_port,
            },
        };
        configuration.try_write_home_dir(&self.node_name)?;
        println!(
            "Configuration written to {:?}",
            Configuration::config_file_path(&self.node_name)?
        );
        Ok(())
    }
}

/// Parses `node_index@address`.
fn parse_peer(peer: &str) -> anyhow::Result<PeerSetting> {
    let (index, address) = peer
        .split_once('@')
        .ok_or_else(|| anyhow!("Peer must look like node_index@ip:port, got {peer}"))?;
    Ok(PeerSetting {
        node_index: index.trim().parse()?,
        address: address.trim().to_string(),
    })
}
