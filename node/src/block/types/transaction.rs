use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::block::types::id::{NodeId, TransactionId};

/// A client command wrapped for the cluster. The payload is opaque to consensus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) payload: Vec<u8>,
}

impl Transaction {
    pub(crate) fn new(creator: NodeId, counter: u64, payload: Vec<u8>) -> Self {
        Self {
            id: TransactionId { creator, counter },
            payload,
        }
    }

    pub(crate) fn creator(&self) -> NodeId {
        self.id.creator
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn {} ({} bytes)", self.id, self.payload.len())
    }
}
