//! Node to node communication.
//!
//! The consensus node only sees the [`Transport`] trait: broadcast to every other node, or respond
//! on the connection a message arrived from. [`tcp::TcpNetwork`] implements it over TCP with
//! length delimited JSON frames and measures round trip times with periodic pings.
use tokio::sync::mpsc;

use crate::block::types::id::NodeId;
use crate::consensus::message::NodeMessage;

pub(crate) mod codec;
pub(crate) mod connection;
pub(crate) mod tcp;

/// Identifies a single TCP connection for the lifetime of the process.
pub(crate) type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NetworkEvent {
    Message {
        message: NodeMessage,
        connection: ConnectionId,
    },
    /// Round trip time to `peer` in seconds.
    RoundTrip { peer: NodeId, rtt: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NetworkCommand {
    Broadcast(NodeMessage),
    Respond(NodeMessage, ConnectionId),
}

/// Outbound side of the network as seen by the consensus node.
pub(crate) trait Transport: Send {
    /// Sends to every other node of the cluster.
    fn broadcast(&mut self, message: NodeMessage);

    /// Sends to whoever is on the other end of `connection`.
    fn respond(&mut self, message: NodeMessage, connection: ConnectionId);
}

/// Hands messages over to the network task.
pub(crate) struct ChannelTransport {
    commands_tx: mpsc::UnboundedSender<NetworkCommand>,
}

impl ChannelTransport {
    pub(crate) fn new(commands_tx: mpsc::UnboundedSender<NetworkCommand>) -> Self {
        Self { commands_tx }
    }

    fn send(&self, cmd: NetworkCommand) {
        if let Err(err) = self.commands_tx.send(cmd) {
            log::error!("Network is gone, dropping {:?}", err.0);
        }
    }
}

impl Transport for ChannelTransport {
    fn broadcast(&mut self, message: NodeMessage) {
        log::trace!("Broadcasting {message}");
        self.send(NetworkCommand::Broadcast(message));
    }

    fn respond(&mut self, message: NodeMessage, connection: ConnectionId) {
        log::trace!("Responding {message} on connection {connection}");
        self.send(NetworkCommand::Respond(message, connection));
    }
}
