//! # piChain API
//!
//! This module contains all the types and functions available as part of the piChain public API.
//! This API is also available over HTTP.
use std::fmt::Display;

use thiserror::Error;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;

use crate::api::types::{ApiBlock, ApiCommitted, ApiNodeStatus, ApiSubmitResponse};

pub mod application;
pub mod http;
pub mod types;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Command rejected by the application")]
    Rejected,
    #[error("Invalid block id: {0}")]
    InvalidBlockId(String),
    #[error("{0}")]
    ApiError(String),
}

#[derive(Debug)]
pub(crate) enum ApiCmd {
    Submit(Vec<u8>, oneshot::Sender<Result<ApiSubmitResponse, ApiError>>),
    QueryCommitted(oneshot::Sender<Result<ApiCommitted, ApiError>>),
    QueryBlock(String, oneshot::Sender<Result<Option<ApiBlock>, ApiError>>),
    QueryStatus(oneshot::Sender<Result<ApiNodeStatus, ApiError>>),
}

impl Display for ApiCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiCmd::Submit(command, _) => write!(f, "Submit({} bytes)", command.len()),
            ApiCmd::QueryCommitted(_) => write!(f, "QueryCommitted"),
            ApiCmd::QueryBlock(id, _) => write!(f, "QueryBlock({id})"),
            ApiCmd::QueryStatus(_) => write!(f, "QueryStatus"),
        }
    }
}

pub(crate) struct ApiListener {
    pub(crate) messages_rcv: Receiver<ApiCmd>,
}

impl ApiListener {
    pub(crate) fn new(messages_rcv: Receiver<ApiCmd>) -> Self {
        Self { messages_rcv }
    }
}

#[derive(Clone)]
pub struct PiChainExternalApi {
    pub(crate) commands_channel: Sender<ApiCmd>,
}

impl PiChainExternalApi {
    pub(crate) fn new() -> (PiChainExternalApi, ApiListener) {
        let (commands_channel, commands_rcv) = channel(100);
        let api_listener = ApiListener::new(commands_rcv);
        let api = PiChainExternalApi { commands_channel };
        (api, api_listener)
    }

    /// Submits a command to the cluster. It is delivered to every application once its block is
    /// committed.
    pub async fn submit(&self, command: Vec<u8>) -> Result<ApiSubmitResponse, ApiError> {
        log::trace!("submit({} bytes)", command.len());
        self.send_and_wait_response(|tx| ApiCmd::Submit(command, tx))
            .await
    }

    /// Returns the ids of all committed blocks, in commit order
    pub async fn committed_blocks(&self) -> Result<ApiCommitted, ApiError> {
        log::trace!("committed_blocks()");
        self.send_and_wait_response(ApiCmd::QueryCommitted).await
    }

    /// Returns block with given id if this node still holds it
    pub async fn get_block(&self, block_id: String) -> Result<Option<ApiBlock>, ApiError> {
        log::trace!("get_block({block_id})");
        self.send_and_wait_response(|tx| ApiCmd::QueryBlock(block_id, tx))
            .await
    }

    pub async fn node_status(&self) -> Result<ApiNodeStatus, ApiError> {
        log::trace!("node_status()");
        self.send_and_wait_response(ApiCmd::QueryStatus).await
    }

    async fn send_and_wait_response<F, R>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(oneshot::Sender<Result<R, ApiError>>) -> ApiCmd,
        R: Send + 'static,
    {
        let (tx, rcv) = oneshot::channel();
        let cmd = f(tx);
        if let Err(err) = self.commands_channel.send(cmd).await {
            log::error!("Failed to send command to piChain: {:?}", err);
            return Err(ApiError::ApiError(
                "Api channel closed. It means that probably piChain is crashed".to_string(),
            ));
        }
        rcv.await.map_err(|e| {
            log::error!("Failed to receive response from piChain: {:?}", e);
            ApiError::ApiError("Failed to receive response from piChain".to_string())
        })?
    }
}
