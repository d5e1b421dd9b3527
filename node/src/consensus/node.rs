use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::api::application::Application;
use crate::block::pool::{PoolInsert, TransactionPool};
use crate::block::tree::{Blocktree, Reach};
use crate::block::types::block::Block;
use crate::block::types::id::{BlockId, NodeId, TransactionId};
use crate::block::types::transaction::Transaction;
use crate::config::ConsensusConfiguration;
use crate::consensus::message::{NodeMessage, PaxosMessage};
use crate::consensus::quorum::VoteSet;
use crate::consensus::role::{Role, Timing};
use crate::consensus::timer::{TimerEvent, Timers};
use crate::consensus::{ConsensusError, Result};
use crate::network::{ConnectionId, Transport};
use crate::storage::StateKey;

/// Blocks whose acknowledgements are tracked at the same time.
const ACK_CACHE_SIZE: usize = 1024;

/// What a node promised as a voter. Persisted, a restarted node must remember it.
#[derive(Debug, Default)]
struct ServerState {
    /// Depth of the deepest block seen in a `TRY`.
    max_block_depth: u64,
    /// Block accepted in the last valid `PROPOSE`.
    prop_block: Option<BlockId>,
    /// Block supporting `prop_block`.
    supp_block: Option<BlockId>,
}

/// State of the node as a proposer, lost on restart.
#[derive(Debug, Default)]
struct ClientState {
    /// Block this node wants to commit in the current attempt.
    new_block: Option<BlockId>,
    /// Block actually proposed in the second round.
    com_block: Option<BlockId>,
    request_seq: u64,
    votes: VoteSet,
    /// Deepest supported proposal reported in `TRY_OK` answers of this attempt.
    prop_block: Option<BlockId>,
    supp_block: Option<BlockId>,
    /// The first round may be skipped.
    quick_proposing: bool,
    commit_running: bool,
    /// Locally created block waiting to be committed.
    committable: Option<BlockId>,
    /// Number of the current voting attempt, keys the commit timeout.
    attempt: u64,
    retry_queued: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeStatus {
    pub(crate) node: NodeId,
    pub(crate) role: Role,
    pub(crate) head: BlockId,
    pub(crate) head_depth: u64,
    pub(crate) committed: BlockId,
    pub(crate) committed_depth: u64,
    pub(crate) genesis: BlockId,
    pub(crate) blocks: usize,
    pub(crate) pending_transactions: usize,
    pub(crate) expected_rtt: f64,
    pub(crate) commit_running: bool,
}

/// The consensus state machine of a single node.
///
/// All events (messages, timers, submissions) are handled one at a time by the caller, none of the
/// methods block. Messages a node sends to itself go through the same handlers as remote ones,
/// with `sender` set to `None`.
pub(crate) struct Node<A: Application> {
    id: NodeId,
    cluster_size: usize,
    config: ConsensusConfiguration,
    role: Role,
    timing: Timing,
    tree: Blocktree,
    pool: TransactionPool,
    server: ServerState,
    client: ClientState,
    /// Distinct nodes which acknowledged the commit of a block.
    acks: LruCache<BlockId, HashSet<NodeId>>,
    transport: Box<dyn Transport>,
    timers: Box<dyn Timers>,
    application: Arc<A>,
}

impl<A: Application> Node<A> {
    pub(crate) fn new(
        id: NodeId,
        cluster_size: usize,
        config: ConsensusConfiguration,
        tree: Blocktree,
        transport: Box<dyn Transport>,
        timers: Box<dyn Timers>,
        application: Arc<A>,
    ) -> Result<Self> {
        let server = ServerState {
            max_block_depth: tree.load(StateKey::MaxBlockDepth)?.unwrap_or(0),
            prop_block: Self::load_block_id(&tree, StateKey::ProposalBlock)?,
            supp_block: Self::load_block_id(&tree, StateKey::SupportBlock)?,
        };
        log::info!(
            "Node {id} starting, cluster size {cluster_size}, server state {:?}",
            server
        );

        let role = Role::bootstrap(id);
        let timing = Timing::new(cluster_size, config.accumulation_time());
        let cache_size = NonZeroUsize::new(ACK_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Node {
            id,
            cluster_size,
            config,
            role,
            timing,
            tree,
            pool: TransactionPool::new(),
            server,
            client: ClientState::default(),
            acks: LruCache::new(cache_size),
            transport,
            timers,
            application,
        })
    }

    fn load_block_id(tree: &Blocktree, key: StateKey) -> Result<Option<BlockId>> {
        let id = tree.load::<BlockId>(key)?;
        Ok(id.filter(|id| tree.contains(id)))
    }

    pub(crate) fn handle_message(
        &mut self,
        message: NodeMessage,
        sender: Option<ConnectionId>,
    ) -> Result<()> {
        log::trace!("Received {message} from {sender:?}");
        match message {
            NodeMessage::Paxos(message) => self.receive_paxos(message, sender),
            NodeMessage::Transaction(tx) => {
                self.receive_transaction(tx);
                Ok(())
            }
            NodeMessage::Block(block) => self.receive_block(block),
            NodeMessage::RequestBlocks { block_id } => {
                self.receive_request_blocks(block_id, sender);
                Ok(())
            }
            NodeMessage::RespondBlocks { blocks } => self.receive_respond_blocks(blocks),
            NodeMessage::AckCommit { block_id, node } => self.receive_ack_commit(block_id, node),
        }
    }

    fn receive_paxos(&mut self, message: PaxosMessage, sender: Option<ConnectionId>) -> Result<()> {
        log::trace!("Paxos {message}");
        match message {
            PaxosMessage::Try {
                request_seq,
                last_committed_block,
                new_block,
            } => self.on_try(request_seq, last_committed_block, new_block, sender),
            PaxosMessage::TryOk {
                request_seq,
                voter,
                proposal_block,
                support_block,
            } => self.on_try_ok(request_seq, voter, proposal_block, support_block),
            PaxosMessage::Propose {
                request_seq,
                com_block,
                new_block,
            } => self.on_propose(request_seq, com_block, new_block, sender),
            PaxosMessage::ProposeAck {
                request_seq,
                voter,
                com_block,
            } => self.on_propose_ack(request_seq, voter, com_block),
            PaxosMessage::Commit { com_block, .. } => self.on_commit(com_block),
        }
    }

    fn on_try(
        &mut self,
        request_seq: u64,
        last_committed_block: BlockId,
        new_block: BlockId,
        sender: Option<ConnectionId>,
    ) -> Result<()> {
        // Catch up with what the proposer has committed
        if !self.tree.is_committed(&last_committed_block) {
            let Some(last_committed) = self.fetch_block(&last_committed_block) else {
                return Ok(());
            };
            self.commit(&last_committed)?;
        }

        let Some(new_block) = self.fetch_block(&new_block) else {
            return Ok(());
        };
        if !self.reachable(&new_block) {
            return Ok(());
        }
        let committed = self.tree.committed().id;
        if !self.tree.ancestor(&committed, &new_block.id) {
            log::debug!(
                "Rejecting TRY for {}, it does not descend from committed {committed}",
                new_block.id
            );
            return Ok(());
        }

        if self.server.max_block_depth < new_block.depth {
            self.tree.store(StateKey::MaxBlockDepth, &new_block.depth)?;
            self.server.max_block_depth = new_block.depth;

            let try_ok = PaxosMessage::TryOk {
                request_seq,
                voter: self.id,
                proposal_block: self.server.prop_block,
                support_block: self.server.supp_block,
            };
            self.reply(try_ok, sender)?;
        }
        Ok(())
    }

    fn on_try_ok(
        &mut self,
        request_seq: u64,
        voter: NodeId,
        proposal_block: Option<BlockId>,
        support_block: Option<BlockId>,
    ) -> Result<()> {
        if request_seq != self.client.request_seq {
            log::trace!("Outdated TRY_OK from {voter}, seq {request_seq}");
            return Ok(());
        }

        if let Some(support_id) = support_block {
            // Without the blocks the vote can't be weighed, it's dropped until they arrive
            let Some(support) = self.fetch_block(&support_id) else {
                return Ok(());
            };
            let proposal = match proposal_block {
                Some(id) => match self.fetch_block(&id) {
                    Some(block) => Some(block.id),
                    None => return Ok(()),
                },
                None => None,
            };
            let abandoned = proposal.is_some_and(|id| !self.on_committed_branch(&id));

            let deeper = match self.client.supp_block.and_then(|id| self.tree.get(&id)) {
                Some(current) => *current < support,
                None => true,
            };
            if abandoned {
                log::debug!("Ignoring proposal {proposal:?} off the committed branch");
            } else if deeper {
                log::debug!("Supporting proposal {proposal:?} with support {support_id}");
                self.client.supp_block = Some(support_id);
                self.client.prop_block = proposal;
            }
        }

        if !self.client.votes.add(voter) {
            log::trace!("Duplicate TRY_OK from {voter}");
            return Ok(());
        }
        if !self.client.votes.has_majority(self.cluster_size) {
            return Ok(());
        }

        let Some(new_block) = self.client.new_block else {
            log::warn!("Majority of TRY_OK without a block to propose");
            return Ok(());
        };
        self.client.votes.clear();
        self.client.request_seq += 1;

        let com_block = self.client.prop_block.unwrap_or(new_block);
        self.client.com_block = Some(com_block);
        log::debug!(
            "Round 1 done, proposing {com_block} for {new_block}, seq {}",
            self.client.request_seq
        );

        let propose = PaxosMessage::Propose {
            request_seq: self.client.request_seq,
            com_block,
            new_block: Some(new_block),
        };
        self.transport
            .broadcast(NodeMessage::Paxos(propose.clone()));
        self.receive_paxos(propose, None)
    }

    fn on_propose(
        &mut self,
        request_seq: u64,
        com_block: BlockId,
        new_block: Option<BlockId>,
        sender: Option<ConnectionId>,
    ) -> Result<()> {
        // A proposal without a new block skipped the first round, it only passes if no TRY was
        // accepted since the last commit
        let reference_depth = match new_block {
            Some(id) => match self.fetch_block(&id) {
                Some(block) => block.depth,
                None => return Ok(()),
            },
            None => 0,
        };
        let Some(com) = self.fetch_block(&com_block) else {
            return Ok(());
        };
        if !self.on_committed_branch(&com.id) {
            log::debug!(
                "Rejecting PROPOSE of {com_block}, it does not descend from committed {}",
                self.tree.committed().id
            );
            return Ok(());
        }
        if reference_depth != self.server.max_block_depth {
            log::trace!(
                "Rejecting PROPOSE of {com_block}, depth {reference_depth} but promised {}",
                self.server.max_block_depth
            );
            return Ok(());
        }

        let support = new_block.unwrap_or(self.tree.genesis().id);
        self.tree.store(StateKey::ProposalBlock, &com.id)?;
        self.tree.store(StateKey::SupportBlock, &support)?;
        self.server.prop_block = Some(com.id);
        self.server.supp_block = Some(support);

        let ack = PaxosMessage::ProposeAck {
            request_seq,
            voter: self.id,
            com_block,
        };
        self.reply(ack, sender)
    }

    fn on_propose_ack(&mut self, request_seq: u64, voter: NodeId, com_block: BlockId) -> Result<()> {
        if request_seq != self.client.request_seq {
            log::trace!("Outdated PROPOSE_ACK from {voter}, seq {request_seq}");
            return Ok(());
        }
        if self.client.com_block != Some(com_block) {
            log::trace!("PROPOSE_ACK from {voter} is for {com_block}, not the proposed block");
            return Ok(());
        }
        if !self.client.votes.add(voter) {
            log::trace!("Duplicate PROPOSE_ACK from {voter}");
            return Ok(());
        }
        if !self.client.votes.has_majority(self.cluster_size) {
            return Ok(());
        }

        let Some(com) = self.fetch_block(&com_block) else {
            return Ok(());
        };
        // Ignore further answers
        self.client.votes.clear();
        if !self.on_committed_branch(&com_block) {
            log::debug!(
                "Proposal {com_block} was overtaken by the commit of {}",
                self.tree.committed().id
            );
            return Ok(());
        }
        self.client.request_seq += 1;
        log::debug!("Round 2 done, committing {com_block}");

        let commit = PaxosMessage::Commit {
            request_seq: self.client.request_seq,
            com_block,
        };
        self.transport.broadcast(NodeMessage::Paxos(commit));
        self.commit(&com)?;

        self.timers
            .cancel(&TimerEvent::CommitTimeout(self.client.attempt));
        self.client.commit_running = false;
        self.client.quick_proposing = true;
        Ok(())
    }

    fn on_commit(&mut self, com_block: BlockId) -> Result<()> {
        match self.fetch_block(&com_block) {
            Some(block) => self.commit(&block),
            None => Ok(()),
        }
    }

    fn receive_transaction(&mut self, tx: Transaction) {
        let id = tx.id;
        match self.pool.insert(tx) {
            PoolInsert::Duplicate => log::trace!("Transaction {id} already seen"),
            PoolInsert::Buffered => log::trace!("Buffered transaction {id}"),
            PoolInsert::BufferedFirst(id) => self.arm_patience(id),
        }
    }

    fn receive_block(&mut self, block: Block) -> Result<()> {
        match self.tree.reach_genesis(&block) {
            Reach::Reachable => {}
            Reach::Missing(parent) => {
                log::debug!("Block {} is not reachable, missing {parent}", block.id);
                self.tree.add(block)?;
                self.request_block(parent);
                return Ok(());
            }
            Reach::Detached => {
                log::debug!("Block {} is older than genesis, ignoring", block.id);
                return Ok(());
            }
        }

        if *self.tree.head() < block || block.creator_role == Role::Fast {
            self.demote();
        }

        if !self.tree.valid(&block) {
            log::debug!("Invalid block {block}");
            return Ok(());
        }
        self.tree.add(block.clone())?;
        self.move_to_block(&block)?;
        self.readjust_timeout();
        Ok(())
    }

    fn receive_request_blocks(&mut self, block_id: BlockId, sender: Option<ConnectionId>) {
        let Some(connection) = sender else {
            return;
        };
        let blocks = self
            .tree
            .recovery_batch(&block_id, self.config.recovery_blocks_count);
        if blocks.is_empty() {
            log::trace!("Requested block {block_id} is unknown");
            return;
        }
        log::debug!("Sending {} blocks starting at {block_id}", blocks.len());
        self.transport
            .respond(NodeMessage::RespondBlocks { blocks }, connection);
    }

    fn receive_respond_blocks(&mut self, blocks: Vec<Block>) -> Result<()> {
        for block in blocks {
            self.tree.add(block)?;
        }
        Ok(())
    }

    fn receive_ack_commit(&mut self, block_id: BlockId, node: NodeId) -> Result<()> {
        match self.acks.get_mut(&block_id) {
            Some(acks) => {
                acks.insert(node);
            }
            None => {
                self.acks.put(block_id, HashSet::from([node]));
            }
        }

        let acknowledged = self
            .acks
            .peek(&block_id)
            .map_or(0, |acks| acks.len());
        if acknowledged < self.cluster_size {
            return Ok(());
        }
        self.acks.pop(&block_id);

        if !self.tree.contains(&block_id) || self.tree.genesis().id == block_id {
            return Ok(());
        }
        log::debug!("All nodes committed {block_id}, it becomes the new genesis");
        let evicted = self.tree.rebase_genesis(&block_id)?;
        for block in &evicted {
            for tx in &block.txs {
                self.pool.forget(&tx.id);
            }
        }
        Ok(())
    }

    pub(crate) fn on_round_trip(&mut self, peer: NodeId, rtt: f64) {
        self.timing.update_rtt(peer, rtt);
    }

    pub(crate) fn on_timer(&mut self, event: TimerEvent) -> Result<()> {
        log::trace!("Timer {event:?} expired");
        match event {
            TimerEvent::Patience(tx) => self.timeout_over(tx),
            TimerEvent::CommitTimeout(attempt) => self.commit_timeout(attempt),
            TimerEvent::RetryCommit => {
                self.client.retry_queued = false;
                self.start_commit_process()
            }
        }
    }

    /// Wraps `command` into a transaction and sends it to the cluster, this node included.
    /// Returns `None` if the application rejected the command.
    pub(crate) fn submit(&mut self, command: Vec<u8>) -> Result<Option<TransactionId>> {
        if !self
            .application
            .check_command(&command)
            .map_err(anyhow::Error::from)?
        {
            log::debug!("Application rejected command of {} bytes", command.len());
            return Ok(None);
        }

        let counter = self.tree.next_counter()?;
        let tx = Transaction::new(self.id, counter, command);
        let id = tx.id;
        log::debug!("New transaction {id}");

        self.transport.broadcast(NodeMessage::Transaction(tx.clone()));
        self.receive_transaction(tx);
        Ok(Some(id))
    }

    fn timeout_over(&mut self, tx: TransactionId) -> Result<()> {
        if !self.pool.is_pending(&tx) {
            log::trace!("Transaction {tx} is already in a block");
            return Ok(());
        }
        let block = self.create_block()?;
        self.move_to_block(&block)?;
        self.transport.broadcast(NodeMessage::Block(block.clone()));
        self.client.committable = Some(block.id);
        self.start_commit_process()
    }

    /// Batches the oldest buffered transactions into a block on top of the head.
    fn create_block(&mut self) -> Result<Block> {
        let counter = self.tree.next_counter()?;
        let txs = self.pool.take(self.config.max_txn_count);
        if self.pool.pending_len() > 0 {
            log::debug!(
                "{} transactions didn't fit in the block, they go into the next one",
                self.pool.pending_len()
            );
        }

        let promoted = self.role.promoted();
        if promoted != self.role {
            log::debug!("Promoted from {:?} to {promoted:?}", self.role);
            self.role = promoted;
        }

        let block = Block::new(
            BlockId::new(self.id, counter),
            self.tree.head(),
            self.role,
            txs,
        );
        log::debug!("Created {block}");
        self.tree.add(block.clone())?;
        self.readjust_timeout();
        Ok(block)
    }

    /// Makes `target` the head. Transactions only found on the abandoned branch are sent again.
    fn move_to_block(&mut self, target: &Block) -> Result<()> {
        if !self.reachable(target) {
            return Ok(());
        }
        let head = self.tree.head().id;
        if target.id == head || self.tree.ancestor(&target.id, &head) {
            return Ok(());
        }
        let Some(common) = self.tree.common_ancestor(&head, &target.id) else {
            log::warn!("No common ancestor of {head} and {}", target.id);
            return Ok(());
        };

        let abandoned = self.tree.branch_transactions(&head, &common);
        let adopted = self.tree.branch_transactions(&target.id, &common);
        let adopted_ids = adopted.iter().map(|tx| tx.id).collect::<HashSet<_>>();
        for tx in &adopted {
            self.pool.mark_known(tx.id);
            self.pool.remove_pending(&tx.id);
        }

        self.tree.set_head(target.id)?;
        log::debug!("Moved head from {head} to {}", target.id);

        for tx in abandoned {
            if adopted_ids.contains(&tx.id) {
                continue;
            }
            log::trace!("Transaction {} was abandoned, sending it again", tx.id);
            self.transport.broadcast(NodeMessage::Transaction(tx.clone()));
            if let PoolInsert::BufferedFirst(id) = self.pool.requeue(tx) {
                self.arm_patience(id);
            }
        }
        self.readjust_timeout();
        Ok(())
    }

    /// Commits `block` and every uncommitted ancestor, oldest first. Idempotent.
    fn commit(&mut self, block: &Block) -> Result<()> {
        let previous = self.tree.committed().id;
        if block.id == previous || self.tree.is_committed(&block.id) {
            return Ok(());
        }
        if !self.reachable(block) {
            return Ok(());
        }
        if self.tree.ancestor(&block.id, &previous) {
            log::trace!("Block {} is older than committed {previous}", block.id);
            return Ok(());
        }
        let Some(cascade) = self.tree.path(&previous, &block.id) else {
            return Err(ConsensusError::InconsistentCommit {
                committed: previous,
                block: block.id,
            });
        };

        if block.creator != self.id {
            self.client.quick_proposing = false;
        }
        self.tree.set_committed(block.id)?;
        self.move_to_block(block)?;

        self.transport.broadcast(NodeMessage::AckCommit {
            block_id: block.id,
            node: self.id,
        });
        self.receive_ack_commit(block.id, self.id)?;

        for committed in cascade {
            self.tree.append_committed(committed.id)?;
            log::debug!(
                "Committed {} with {} transactions",
                committed.id,
                committed.txs.len()
            );
            if let Err(err) = self.application.on_committed(committed.commands()) {
                log::error!("Application failed to process block {}: {err:?}", committed.id);
            }
        }

        // A new committed baseline voids earlier promises
        self.tree.delete(StateKey::MaxBlockDepth)?;
        self.tree.delete(StateKey::ProposalBlock)?;
        self.tree.delete(StateKey::SupportBlock)?;
        self.server = ServerState::default();
        self.client.commit_running = false;
        Ok(())
    }

    /// Starts a voting attempt for the last created block if this node is allowed to.
    fn start_commit_process(&mut self) -> Result<()> {
        let Some(committable) = self.client.committable else {
            return Ok(());
        };
        if self.tree.is_committed(&committable) {
            log::trace!("Block {committable} is already committed");
            return Ok(());
        }
        if !self.tree.ancestor(&self.tree.committed().id, &committable) {
            log::debug!("Block {committable} is off the committed branch, dropping it");
            self.client.committable = None;
            return Ok(());
        }
        if self.role != Role::Fast {
            return Ok(());
        }

        let timeout = self.timing.commit_timeout(self.config.max_commit_time());
        if self.client.commit_running {
            if !self.client.retry_queued {
                log::debug!("Commit already running, retrying {committable} later");
                self.client.retry_queued = true;
                self.timers.schedule(TimerEvent::RetryCommit, timeout);
            }
            return Ok(());
        }

        self.client.commit_running = true;
        self.client.votes.clear();
        self.client.request_seq += 1;
        self.client.supp_block = None;
        self.client.prop_block = None;
        self.client.attempt += 1;
        self.timers
            .schedule(TimerEvent::CommitTimeout(self.client.attempt), timeout);

        if self.client.quick_proposing {
            log::debug!(
                "Quick proposing {committable}, seq {}",
                self.client.request_seq
            );
            self.client.com_block = Some(committable);
            let propose = PaxosMessage::Propose {
                request_seq: self.client.request_seq,
                com_block: committable,
                new_block: None,
            };
            self.transport
                .broadcast(NodeMessage::Paxos(propose.clone()));
            self.receive_paxos(propose, None)
        } else {
            log::debug!("Trying {committable}, seq {}", self.client.request_seq);
            self.client.new_block = Some(committable);
            let try_msg = PaxosMessage::Try {
                request_seq: self.client.request_seq,
                last_committed_block: self.tree.committed().id,
                new_block: committable,
            };
            self.transport
                .broadcast(NodeMessage::Paxos(try_msg.clone()));
            self.receive_paxos(try_msg, None)
        }
    }

    fn commit_timeout(&mut self, attempt: u64) -> Result<()> {
        if !self.client.commit_running || attempt != self.client.attempt {
            return Ok(());
        }
        log::debug!("Commit attempt {attempt} timed out, trying again");
        self.client.commit_running = false;
        self.client.quick_proposing = false;
        self.start_commit_process()
    }

    /// Rearms the patience timer if the oldest buffered transaction changed.
    fn readjust_timeout(&mut self) {
        if let Some((previous, oldest)) = self.pool.readjust() {
            if let Some(previous) = previous {
                self.timers.cancel(&TimerEvent::Patience(previous));
            }
            self.arm_patience(oldest);
        }
    }

    fn arm_patience(&mut self, tx: TransactionId) {
        let patience = self.timing.patience(self.role);
        log::trace!("Waiting {patience:?} for {tx} as {:?}", self.role);
        self.timers.schedule(TimerEvent::Patience(tx), patience);
    }

    fn demote(&mut self) {
        if self.role != Role::Slow {
            log::debug!("Demoted from {:?} to Slow", self.role);
        }
        self.role = Role::Slow;
        self.client.quick_proposing = false;
    }

    /// Committed, or a descendant of the committed block.
    fn on_committed_branch(&self, id: &BlockId) -> bool {
        self.tree.is_committed(id) || self.tree.ancestor(&self.tree.committed().id, id)
    }

    fn reachable(&mut self, block: &Block) -> bool {
        match self.tree.reach_genesis(block) {
            Reach::Reachable => true,
            Reach::Missing(parent) => {
                self.request_block(parent);
                false
            }
            Reach::Detached => {
                log::trace!("Block {} can't reach genesis", block.id);
                false
            }
        }
    }

    /// Looks up a block, asking the peers for it if it's unknown.
    fn fetch_block(&mut self, id: &BlockId) -> Option<Block> {
        let block = self.tree.get(id).cloned();
        if block.is_none() {
            self.request_block(*id);
        }
        block
    }

    fn request_block(&mut self, block_id: BlockId) {
        log::debug!("Requesting missing block {block_id}");
        self.transport
            .broadcast(NodeMessage::RequestBlocks { block_id });
    }

    fn reply(&mut self, message: PaxosMessage, sender: Option<ConnectionId>) -> Result<()> {
        match sender {
            Some(connection) => {
                self.transport
                    .respond(NodeMessage::Paxos(message), connection);
                Ok(())
            }
            None => self.receive_paxos(message, None),
        }
    }

    pub(crate) fn status(&self) -> NodeStatus {
        let head = self.tree.head();
        let committed = self.tree.committed();
        NodeStatus {
            node: self.id,
            role: self.role,
            head: head.id,
            head_depth: head.depth,
            committed: committed.id,
            committed_depth: committed.depth,
            genesis: self.tree.genesis().id,
            blocks: self.tree.len(),
            pending_transactions: self.pool.pending_len(),
            expected_rtt: self.timing.expected_rtt(),
            commit_running: self.client.commit_running,
        }
    }

    /// Ids of all committed blocks, in commit order.
    pub(crate) fn committed_blocks(&self) -> Vec<BlockId> {
        self.tree.committed_log().to_vec()
    }

    pub(crate) fn block(&self, id: &BlockId) -> Option<Block> {
        self.tree.get(id).cloned()
    }
}

#[cfg(test)]
impl<A: Application> Node<A> {
    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn tree(&self) -> &Blocktree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Blocktree {
        &mut self.tree
    }

    pub(crate) fn into_tree(self) -> Blocktree {
        self.tree
    }

    pub(crate) fn request_seq(&self) -> u64 {
        self.client.request_seq
    }

    pub(crate) fn votes(&self) -> usize {
        self.client.votes.len()
    }

    pub(crate) fn max_block_depth(&self) -> u64 {
        self.server.max_block_depth
    }

    pub(crate) fn quick_proposing(&self) -> bool {
        self.client.quick_proposing
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub(crate) fn committable(&self) -> Option<BlockId> {
        self.client.committable
    }

    pub(crate) fn set_slow_backoff(&mut self, backoff: f64) {
        self.timing = Timing::new(self.cluster_size, self.config.accumulation_time())
            .with_slow_backoff(backoff);
    }
}
