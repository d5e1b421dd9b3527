//! A single TCP connection to another node.
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::block::types::id::NodeId;
use crate::network::codec::{Frame, FrameCodec};
use crate::network::ConnectionId;

#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    Opened {
        connection: ConnectionId,
        /// Known for connections we dialed, inbound connections are anonymous.
        peer: Option<NodeId>,
        writer: mpsc::UnboundedSender<Frame>,
    },
    Frame {
        connection: ConnectionId,
        frame: Frame,
    },
    Closed {
        connection: ConnectionId,
    },
}

pub(crate) struct ConnectionHandler {
    stream: TcpStream,
    connection: ConnectionId,
    peer: Option<NodeId>,
}

impl ConnectionHandler {
    pub(crate) fn new(stream: TcpStream, connection: ConnectionId, peer: Option<NodeId>) -> Self {
        ConnectionHandler {
            stream,
            connection,
            peer,
        }
    }

    /// Reads frames into `events` and writes whatever is sent to the writer handed out in
    /// [`ConnectionEvent::Opened`], until either side goes away.
    pub(crate) async fn run(self, events: mpsc::UnboundedSender<ConnectionEvent>) {
        let connection = self.connection;
        let peer_addr = match self.stream.peer_addr() {
            Ok(address) => address.to_string(),
            Err(err) => {
                log::error!("Failed to get peer address: {}", err);
                return;
            }
        };
        if let Err(err) = self.stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, err);
        }

        let (read, write) = self.stream.into_split();
        let mut reader = FramedRead::new(read, FrameCodec::new());
        let mut writer = FramedWrite::new(write, FrameCodec::new());
        let (frames_tx, mut frames_rcv) = mpsc::unbounded_channel();

        let opened = ConnectionEvent::Opened {
            connection,
            peer: self.peer,
            writer: frames_tx,
        };
        if events.send(opened).is_err() {
            return;
        }
        log::debug!("Connection {} to {} opened", connection, peer_addr);

        loop {
            tokio::select! {
                frame = reader.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            if events.send(ConnectionEvent::Frame { connection, frame }).is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            log::error!("Failed to read from {}: {}", peer_addr, err);
                            break;
                        }
                        None => {
                            log::debug!("Connection closed by {}", peer_addr);
                            break;
                        }
                    }
                }
                frame = frames_rcv.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(err) = writer.send(frame).await {
                                log::error!("Failed to write to {}: {}", peer_addr, err);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        events.send(ConnectionEvent::Closed { connection }).ok();
    }
}
