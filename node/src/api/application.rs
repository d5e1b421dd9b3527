use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplicationError {
    //Just a placeholder for now
    #[error("ApplicationError::GeneralError: {0}")]
    GeneralError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApplicationError>;

/// An opaque command submitted by a client.
pub type Command = Vec<u8>;

/// Hook of the application replicated by piChain.
///
/// Notes:
/// A) These functions are called synchronously by the node's main loop, they should be fast.
/// B) They should not wait on a lock.
/// C) They should not panic.
pub trait Application: Send + Sync {
    /// Called before a command submitted to this node is turned into a transaction.
    /// Rejected commands never reach the cluster.
    fn check_command(&self, command: &[u8]) -> Result<bool> {
        log::trace!("check_command: {} bytes", command.len());
        Ok(true)
    }

    /// Called once per committed block, in commit order, with the commands of the block.
    fn on_committed(&self, commands: Vec<Command>) -> Result<()>;
}

#[derive(Default)]
pub struct DefaultApplication;

/// Accepts everything and logs what gets committed.
impl Application for DefaultApplication {
    fn on_committed(&self, commands: Vec<Command>) -> Result<()> {
        log::info!("Committed block with {} commands", commands.len());
        for command in commands {
            log::debug!("Committed command: {}", String::from_utf8_lossy(&command));
        }
        Ok(())
    }
}
