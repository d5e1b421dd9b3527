use clap::Parser;

use crate::api::http::client::PiChainHttpClient;

const DEFAULT_NODE_URL: &str = "http://127.0.0.1:7000";

#[derive(Debug, Clone, Parser)]
pub struct SubmitCmd {
    #[clap(long, default_value = DEFAULT_NODE_URL)]
    pub url: String,
    pub command: String,
}

impl SubmitCmd {
    pub async fn execute(self) -> anyhow::Result<()> {
        let client = PiChainHttpClient::new(self.url);
        let response = client.submit(self.command.into_bytes()).await?;
        println!("Submitted transaction {}", response.transaction_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Parser)]
pub struct CommittedCmd {
    #[clap(long, default_value = DEFAULT_NODE_URL)]
    pub url: String,
    /// Print the commands of every committed block
    #[clap(long)]
    pub commands: bool,
}

impl CommittedCmd {
    pub async fn execute(self) -> anyhow::Result<()> {
        let client = PiChainHttpClient::new(self.url);
        let committed = client.committed().await?;
        for id in committed.blocks {
            if !self.commands {
                println!("{id}");
                continue;
            }
            match client.get_block(&id).await? {
                Some(block) => {
                    let commands = block
                        .transactions
                        .iter()
                        .map(|tx| String::from_utf8_lossy(&tx.payload).into_owned())
                        .collect::<Vec<_>>();
                    println!("{id}: {commands:?}");
                }
                // Pruned blocks only keep their id
                None => println!("{id}: pruned"),
            }
        }
        Ok(())
    }
}
