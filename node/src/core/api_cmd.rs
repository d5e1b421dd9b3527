use crate::api::application::Application;
use crate::api::types::{ApiBlock, ApiCommitted, ApiSubmitResponse};
use crate::api::{ApiCmd, ApiError};
use crate::block::types::id::BlockId;
use crate::consensus::node::Node;
use crate::consensus::Result;

pub(crate) struct ApiCmdProcessor;

impl ApiCmdProcessor {
    /// Answers the request from the node's state. Only errors of the consensus itself are
    /// returned, failures to deliver the reply are logged.
    pub(crate) fn process_api_requests<A: Application>(
        node: &mut Node<A>,
        cmd: ApiCmd,
    ) -> Result<()> {
        log::trace!("Processing API request: {}", cmd);
        match cmd {
            ApiCmd::Submit(command, reply) => {
                let (response, result) = match node.submit(command) {
                    Ok(Some(id)) => (
                        Ok(ApiSubmitResponse {
                            transaction_id: id.to_string(),
                        }),
                        Ok(()),
                    ),
                    Ok(None) => (Err(ApiError::Rejected), Ok(())),
                    Err(err) => (
                        Err(ApiError::ApiError(format!("Error submitting command: {err}"))),
                        Err(err),
                    ),
                };
                if reply.send(response).is_err() {
                    log::error!("Error sending submit response to api");
                }
                return result;
            }

            ApiCmd::QueryCommitted(reply) => {
                let blocks = node
                    .committed_blocks()
                    .iter()
                    .map(BlockId::to_string)
                    .collect();
                if reply.send(Ok(ApiCommitted { blocks })).is_err() {
                    log::error!("Error sending committed blocks to api");
                }
            }

            ApiCmd::QueryBlock(block_id, reply) => {
                let response = match block_id.parse::<BlockId>() {
                    Ok(id) => Ok(node.block(&id).as_ref().map(ApiBlock::from)),
                    Err(_) => Err(ApiError::InvalidBlockId(block_id)),
                };
                if reply.send(response).is_err() {
                    log::error!("Error sending block to api");
                }
            }

            ApiCmd::QueryStatus(reply) => {
                if reply.send(Ok(node.status().into())).is_err() {
                    log::error!("Error sending node status to api");
                }
            }
        }
        Ok(())
    }
}
