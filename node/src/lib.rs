//! # piChain
//!
//! A crash fault tolerant consensus node which agrees on a single, totally ordered sequence of
//! client submitted commands.
//!
//! Nodes maintain a tree of candidate blocks. A Paxos style two round voting protocol decides
//! which branch gets committed, while every node adapts its eagerness to propose new blocks
//! (fast, moderate or slow) so that normally only a single node proposes and the voting is
//! uncontended.
//!
//! Applications plug in through [`api::application::Application`] and receive every committed
//! block as an ordered batch of commands.

pub use crate::api::application::{Application, DefaultApplication};
pub use crate::api::{ApiError, PiChainExternalApi};
pub use crate::core::builder::{PiChainHandle, PiChainStarter};
pub use crate::core::pichain::PiChain;
pub use crate::core::shutdown::ShutdownHandle;

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;

pub(crate) mod block;
pub(crate) mod consensus;
pub mod core;
pub(crate) mod network;
pub(crate) mod storage;
pub(crate) mod utilities;
