use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::block::types::id::NodeId;
use crate::config::{Configuration, PeerSetting};
use crate::network::codec::Frame;
use crate::network::connection::{ConnectionEvent, ConnectionHandler};
use crate::network::{ChannelTransport, ConnectionId, NetworkCommand, NetworkEvent};
use crate::utilities::time::PiChainTime;

const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

struct Connection {
    peer: Option<NodeId>,
    writer: mpsc::UnboundedSender<Frame>,
}

/// Aborts the dialers when the network task ends.
struct Dialers(Vec<JoinHandle<()>>);

impl Drop for Dialers {
    fn drop(&mut self) {
        for dialer in &self.0 {
            dialer.abort();
        }
    }
}

/// Keeps one outbound connection to every remote peer and accepts inbound connections.
///
/// Broadcasts go out on the outbound connections, responses on the connection the request came
/// from. Outbound connections are also used to ping the peers.
pub(crate) struct TcpNetwork {
    listen_address: String,
    peers: Vec<PeerSetting>,
    ping_interval: Duration,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
    commands_rcv: mpsc::UnboundedReceiver<NetworkCommand>,
    listener: Option<TcpListener>,
}

impl TcpNetwork {
    pub(crate) fn new(
        listen_address: String,
        peers: Vec<PeerSetting>,
        ping_interval: Duration,
    ) -> (
        TcpNetwork,
        mpsc::UnboundedReceiver<NetworkEvent>,
        ChannelTransport,
    ) {
        let (events_tx, events_rcv) = mpsc::unbounded_channel();
        let (commands_tx, commands_rcv) = mpsc::unbounded_channel();
        let network = TcpNetwork {
            listen_address,
            peers,
            ping_interval,
            events_tx,
            commands_rcv,
            listener: None,
        };
        (network, events_rcv, ChannelTransport::new(commands_tx))
    }

    pub(crate) fn from_config(
        config: &Configuration,
    ) -> (
        TcpNetwork,
        mpsc::UnboundedReceiver<NetworkEvent>,
        ChannelTransport,
    ) {
        Self::new(
            config.protocol_address(),
            config.remote_peers(),
            config.consensus.ping_interval(),
        )
    }

    pub(crate) async fn bind(&mut self) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(&self.listen_address).await?;
        let address = listener.local_addr()?;
        log::info!("Accepting connections at {}", address);
        self.listener = Some(listener);
        Ok(address)
    }

    pub(crate) async fn run(mut self) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow!("Network must be bound before it runs"))?;

        let ids = Arc::new(AtomicU64::new(0));
        let (conn_events_tx, mut conn_events_rcv) = mpsc::unbounded_channel();
        let _dialers = Dialers(
            self.peers
                .iter()
                .cloned()
                .map(|peer| tokio::spawn(dial(peer, ids.clone(), conn_events_tx.clone())))
                .collect(),
        );

        let mut connections: HashMap<ConnectionId, Connection> = HashMap::new();
        let mut ping = tokio::time::interval(self.ping_interval);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, address)) => {
                            log::debug!("Accepted connection from {}", address);
                            let connection = ids.fetch_add(1, Ordering::Relaxed);
                            let handler = ConnectionHandler::new(stream, connection, None);
                            tokio::spawn(handler.run(conn_events_tx.clone()));
                        }
                        Err(err) => {
                            log::error!("Failed to accept connection: {}", err);
                        }
                    }
                }
                Some(event) = conn_events_rcv.recv() => {
                    if !self.on_connection_event(&mut connections, event) {
                        log::info!("Consensus stopped, closing network");
                        return Ok(());
                    }
                }
                cmd = self.commands_rcv.recv() => {
                    match cmd {
                        Some(cmd) => Self::route(&connections, cmd),
                        None => {
                            log::info!("Consensus stopped, closing network");
                            return Ok(());
                        }
                    }
                }
                _ = ping.tick() => {
                    let timestamp = PiChainTime::now();
                    for connection in connections.values().filter(|c| c.peer.is_some()) {
                        connection.writer.send(Frame::Ping { timestamp }).ok();
                    }
                }
            }
        }
    }

    /// Returns false once the node stopped listening.
    fn on_connection_event(
        &mut self,
        connections: &mut HashMap<ConnectionId, Connection>,
        event: ConnectionEvent,
    ) -> bool {
        match event {
            ConnectionEvent::Opened {
                connection,
                peer,
                writer,
            } => {
                connections.insert(connection, Connection { peer, writer });
                true
            }
            ConnectionEvent::Closed { connection } => {
                connections.remove(&connection);
                true
            }
            ConnectionEvent::Frame { connection, frame } => match frame {
                Frame::Ping { timestamp } => {
                    if let Some(conn) = connections.get(&connection) {
                        conn.writer.send(Frame::Pong { timestamp }).ok();
                    }
                    true
                }
                Frame::Pong { timestamp } => {
                    let peer = connections.get(&connection).and_then(|c| c.peer);
                    match peer {
                        Some(peer) => {
                            let rtt = PiChainTime::round_trip_since(timestamp);
                            self.events_tx
                                .send(NetworkEvent::RoundTrip { peer, rtt })
                                .is_ok()
                        }
                        None => true,
                    }
                }
                Frame::Node(message) => self
                    .events_tx
                    .send(NetworkEvent::Message {
                        message,
                        connection,
                    })
                    .is_ok(),
            },
        }
    }

    fn route(connections: &HashMap<ConnectionId, Connection>, cmd: NetworkCommand) {
        match cmd {
            NetworkCommand::Broadcast(message) => {
                for connection in connections.values().filter(|c| c.peer.is_some()) {
                    connection.writer.send(Frame::Node(message.clone())).ok();
                }
            }
            NetworkCommand::Respond(message, connection) => match connections.get(&connection) {
                Some(conn) => {
                    conn.writer.send(Frame::Node(message)).ok();
                }
                None => log::debug!("Connection {} is gone, dropping {}", connection, message),
            },
        }
    }
}

/// Keeps a connection to `peer` open, reconnecting when it drops.
async fn dial(
    peer: PeerSetting,
    ids: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let peer_id = NodeId::from(peer.node_index);
    loop {
        match TcpStream::connect(&peer.address).await {
            Ok(stream) => {
                let connection = ids.fetch_add(1, Ordering::Relaxed);
                log::info!("Connected to node {} at {}", peer_id, peer.address);
                ConnectionHandler::new(stream, connection, Some(peer_id))
                    .run(events.clone())
                    .await;
                log::info!("Lost connection to node {}", peer_id);
            }
            Err(err) => {
                log::trace!("Failed to connect to {}: {}", peer.address, err);
            }
        }
        if events.is_closed() {
            break;
        }
        tokio::time::sleep(RECONNECT_INTERVAL).await;
    }
}
