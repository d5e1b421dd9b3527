//! In-process cluster for driving several nodes deterministically.
//!
//! Messages are recorded by [`RecordingTransport`] and delivered by [`Cluster::deliver_all`],
//! timers are only fired on request. The connection id of a message is the index of the node that
//! sent it. [`Cluster::deliver_random`] delivers one message at a time in an order picked by the
//! caller's random generator.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use crate::api::application::{self, Application, Command};
use crate::block::tree::Blocktree;
use crate::block::types::block::Block;
use crate::block::types::id::{BlockId, NodeId};
use crate::block::types::transaction::Transaction;
use crate::config::ConsensusConfiguration;
use crate::consensus::message::NodeMessage;
use crate::consensus::node::Node;
use crate::consensus::role::Role;
use crate::consensus::timer::{TimerEvent, Timers};
use crate::consensus::Result;
use crate::network::{ConnectionId, Transport};
use crate::storage::memory::MemoryStorage;
use crate::storage::PiChainDatabase;

mod protocol;

#[derive(Debug, Clone)]
pub(crate) enum Sent {
    Broadcast(NodeMessage),
    Respond(NodeMessage, ConnectionId),
}

#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingTransport {
    pub(crate) fn drain(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub(crate) fn broadcasts(&self) -> Vec<NodeMessage> {
        self.sent
            .lock()
            .iter()
            .filter_map(|sent| match sent {
                Sent::Broadcast(message) => Some(message.clone()),
                Sent::Respond(..) => None,
            })
            .collect()
    }

    pub(crate) fn responses(&self) -> Vec<(NodeMessage, ConnectionId)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|sent| match sent {
                Sent::Respond(message, connection) => Some((message.clone(), *connection)),
                Sent::Broadcast(..) => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn broadcast(&mut self, message: NodeMessage) {
        self.sent.lock().push(Sent::Broadcast(message));
    }

    fn respond(&mut self, message: NodeMessage, connection: ConnectionId) {
        self.sent.lock().push(Sent::Respond(message, connection));
    }
}

#[derive(Clone, Default)]
pub(crate) struct ManualTimers {
    scheduled: Arc<Mutex<HashMap<TimerEvent, Duration>>>,
}

impl ManualTimers {
    pub(crate) fn get(&self, event: &TimerEvent) -> Option<Duration> {
        self.scheduled.lock().get(event).cloned()
    }

    pub(crate) fn remove(&self, event: &TimerEvent) -> bool {
        self.scheduled.lock().remove(event).is_some()
    }

    /// All scheduled events in a stable order.
    pub(crate) fn events(&self) -> Vec<TimerEvent> {
        let mut events = self.scheduled.lock().keys().cloned().collect::<Vec<_>>();
        events.sort_by_key(|event| format!("{event:?}"));
        events
    }

    pub(crate) fn patience_events(&self) -> Vec<TimerEvent> {
        self.scheduled
            .lock()
            .keys()
            .filter(|event| matches!(event, TimerEvent::Patience(_)))
            .cloned()
            .collect()
    }
}

impl Timers for ManualTimers {
    fn schedule(&mut self, event: TimerEvent, after: Duration) {
        self.scheduled.lock().insert(event, after);
    }

    fn cancel(&mut self, event: &TimerEvent) {
        self.scheduled.lock().remove(event);
    }
}

#[derive(Default)]
pub(crate) struct RecordingApplication {
    committed: Mutex<Vec<Vec<Command>>>,
}

impl RecordingApplication {
    pub(crate) fn committed(&self) -> Vec<Vec<Command>> {
        self.committed.lock().clone()
    }
}

impl Application for RecordingApplication {
    fn on_committed(&self, commands: Vec<Command>) -> application::Result<()> {
        self.committed.lock().push(commands);
        Ok(())
    }
}

pub(crate) struct TestNode {
    pub(crate) node: Node<RecordingApplication>,
    pub(crate) transport: RecordingTransport,
    pub(crate) timers: ManualTimers,
    pub(crate) application: Arc<RecordingApplication>,
}

impl TestNode {
    pub(crate) fn new(index: u32, cluster_size: usize, config: ConsensusConfiguration) -> Self {
        Self::with_storage(index, cluster_size, config, Box::new(MemoryStorage::new()))
    }

    pub(crate) fn with_storage(
        index: u32,
        cluster_size: usize,
        config: ConsensusConfiguration,
        storage: Box<dyn PiChainDatabase>,
    ) -> Self {
        let transport = RecordingTransport::default();
        let timers = ManualTimers::default();
        let application = Arc::new(RecordingApplication::default());
        let tree = Blocktree::open(storage).unwrap();
        let node = Node::new(
            NodeId(index),
            cluster_size,
            config,
            tree,
            Box::new(transport.clone()),
            Box::new(timers.clone()),
            application.clone(),
        )
        .unwrap();
        TestNode {
            node,
            transport,
            timers,
            application,
        }
    }

    /// Fires the pending patience timer, if there is one.
    pub(crate) fn fire_patience(&mut self) {
        for event in self.timers.patience_events() {
            self.fire(event);
        }
    }

    pub(crate) fn fire(&mut self, event: TimerEvent) {
        self.try_fire(event).unwrap();
    }

    pub(crate) fn try_fire(&mut self, event: TimerEvent) -> Result<()> {
        self.timers.remove(&event);
        self.node.on_timer(event)
    }
}

pub(crate) struct Cluster {
    pub(crate) nodes: Vec<TestNode>,
    /// Nodes whose messages are dropped in both directions.
    pub(crate) down: HashSet<usize>,
    /// Every message delivered so far, with the index of its sender.
    pub(crate) delivered: Vec<(usize, NodeMessage)>,
    /// Messages sent but not yet delivered by [`Cluster::deliver_random`], as (from, to, message).
    in_flight: Vec<(usize, usize, NodeMessage)>,
}

impl Cluster {
    pub(crate) fn new(size: usize) -> Self {
        Self::with_config(size, ConsensusConfiguration::default())
    }

    pub(crate) fn with_config(size: usize, config: ConsensusConfiguration) -> Self {
        let nodes = (0..size)
            .map(|index| TestNode::new(index as u32, size, config.clone()))
            .collect();
        Cluster {
            nodes,
            down: HashSet::new(),
            delivered: vec![],
            in_flight: vec![],
        }
    }

    pub(crate) fn node(&mut self, index: usize) -> &mut TestNode {
        &mut self.nodes[index]
    }

    /// Delivers messages until no node has anything left to send.
    pub(crate) fn deliver_all(&mut self) {
        for _ in 0..10_000 {
            let mut quiet = true;
            for from in 0..self.nodes.len() {
                let sent = self.nodes[from].transport.drain();
                for sent in sent {
                    quiet = false;
                    if self.down.contains(&from) {
                        continue;
                    }
                    match sent {
                        Sent::Broadcast(message) => {
                            for to in 0..self.nodes.len() {
                                if to != from {
                                    self.deliver(from, to, message.clone());
                                }
                            }
                        }
                        Sent::Respond(message, connection) => {
                            self.deliver(from, connection as usize, message)
                        }
                    }
                }
            }
            if quiet {
                return;
            }
        }
        panic!("Cluster did not settle");
    }

    fn deliver(&mut self, from: usize, to: usize, message: NodeMessage) {
        self.try_deliver(from, to, message).unwrap();
    }

    fn try_deliver(&mut self, from: usize, to: usize, message: NodeMessage) -> Result<()> {
        if self.down.contains(&to) {
            return Ok(());
        }
        self.delivered.push((from, message.clone()));
        self.nodes[to]
            .node
            .handle_message(message, Some(from as ConnectionId))
    }

    /// Delivers one randomly picked message in flight, or loses it with probability `drop_rate`.
    /// Returns `Ok(false)` if nothing was in flight.
    pub(crate) fn deliver_random<R: Rng>(&mut self, rng: &mut R, drop_rate: f64) -> Result<bool> {
        for from in 0..self.nodes.len() {
            let sent = self.nodes[from].transport.drain();
            if self.down.contains(&from) {
                continue;
            }
            for sent in sent {
                match sent {
                    Sent::Broadcast(message) => {
                        for to in (0..self.nodes.len()).filter(|to| *to != from) {
                            self.in_flight.push((from, to, message.clone()));
                        }
                    }
                    Sent::Respond(message, connection) => {
                        self.in_flight.push((from, connection as usize, message))
                    }
                }
            }
        }
        if self.in_flight.is_empty() {
            return Ok(false);
        }

        let picked = rng.gen_range(0..self.in_flight.len());
        let (from, to, message) = self.in_flight.swap_remove(picked);
        if rng.gen_bool(drop_rate) {
            return Ok(true);
        }
        self.try_deliver(from, to, message)?;
        Ok(true)
    }

    pub(crate) fn committed_depths(&self) -> Vec<u64> {
        self.nodes
            .iter()
            .map(|test_node| test_node.node.status().committed_depth)
            .collect()
    }

    pub(crate) fn submit(&mut self, index: usize, command: &str) {
        self.nodes[index]
            .node
            .submit(command.as_bytes().to_vec())
            .unwrap();
    }
}

pub(crate) fn block_with(creator: u32, counter: u64, parent: &Block, txs: usize) -> Block {
    let txs = (0..txs as u64)
        .map(|i| Transaction::new(NodeId(creator), counter * 100 + i, vec![i as u8]))
        .collect();
    Block::new(BlockId::new(NodeId(creator), counter), parent, Role::Slow, txs)
}

pub(crate) fn commands(batch: &[&str]) -> Vec<Command> {
    batch.iter().map(|c| c.as_bytes().to_vec()).collect()
}
