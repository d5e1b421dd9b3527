use clap::Parser;

pub mod client;
pub mod init;
pub mod run_node;

#[derive(Parser, Debug, Clone)]
#[command()]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Writes the configuration of a new node
    Init(init::InitCmd),
    /// Runs a node until SIGINT or SIGTERM
    RunNode(run_node::RunNodeCmd),
    /// Submits a command through a node's HTTP API
    Submit(client::SubmitCmd),
    /// Lists the blocks a node has committed
    Committed(client::CommittedCmd),
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.subcommand {
            Subcommand::Init(cmd) => cmd.execute(),
            Subcommand::RunNode(cmd) => cmd.execute().await,
            Subcommand::Submit(cmd) => cmd.execute().await,
            Subcommand::Committed(cmd) => cmd.execute().await,
        }
    }
}
