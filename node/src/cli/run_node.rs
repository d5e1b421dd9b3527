use std::path::PathBuf;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};

use crate::api::application::DefaultApplication;
use crate::config::Configuration;
use crate::core::builder::PiChainStarter;

#[derive(Debug, Clone, Parser)]
pub struct RunNodeCmd {
    #[clap(short, long)]
    pub config_file: String,
    /// Keep all state in memory
    #[clap(long)]
    pub ephemeral: bool,
}

impl RunNodeCmd {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = match Configuration::try_load(PathBuf::from(self.config_file.as_str())) {
            Ok(conf) => conf,
            Err(err) => anyhow::bail!("Error loading configuration file: {err:?}"),
        };

        let mut starter = PiChainStarter::new(conf)?.with_application(DefaultApplication);
        if self.ephemeral {
            starter = starter.ephemeral();
        }
        let pichain = starter.init_tasks().await?;

        let mut pichain_shutdown = pichain.handle().shutdown;
        let pichain_handle = tokio::spawn(pichain.run());

        let mut stream_int = signal(SignalKind::interrupt())?;
        let mut stream_term = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = stream_int.recv() => {
                pichain_shutdown.shutdown();
            }
            _ = stream_term.recv() => {
                pichain_shutdown.shutdown();
            }
        }

        pichain_handle.await?;
        Ok(())
    }
}
