use std::time::Duration;

use assert_matches::assert_matches;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::block::tree::Reach;
use crate::block::types::id::TransactionId;
use crate::consensus::message::PaxosMessage;
use crate::consensus::role::EPSILON;
use crate::consensus::ConsensusError;

fn tx_id(creator: u32, counter: u64) -> TransactionId {
    TransactionId {
        creator: NodeId(creator),
        counter,
    }
}

fn genesis_of(test_node: &TestNode) -> Block {
    test_node.node.tree().genesis().clone()
}

fn proposals(transport: &RecordingTransport) -> Vec<PaxosMessage> {
    transport
        .broadcasts()
        .into_iter()
        .filter_map(|message| match message {
            NodeMessage::Paxos(propose @ PaxosMessage::Propose { .. }) => Some(propose),
            _ => None,
        })
        .collect()
}

fn propose_ack(request_seq: u64, voter: u32, com_block: BlockId) -> NodeMessage {
    NodeMessage::Paxos(PaxosMessage::ProposeAck {
        request_seq,
        voter: NodeId(voter),
        com_block,
    })
}

/// Every node committed a prefix of what the others committed.
fn assert_consistent_logs(cluster: &Cluster) {
    let logs = cluster
        .nodes
        .iter()
        .map(|test_node| test_node.application.committed())
        .collect::<Vec<_>>();
    for a in &logs {
        for b in &logs {
            let shared = a.len().min(b.len());
            assert_eq!(a[..shared], b[..shared]);
        }
    }
}

fn assert_depths_grew(before: &[u64], now: &[u64]) {
    assert!(
        now.iter().zip(before).all(|(now, before)| now >= before),
        "committed depth went back from {before:?} to {now:?}"
    );
}

#[test]
fn single_node_commits_its_own_block() {
    let mut cluster = Cluster::new(1);
    cluster.submit(0, "a");

    let test_node = cluster.node(0);
    let patience = TimerEvent::Patience(tx_id(0, 1));
    assert_eq!(test_node.timers.get(&patience), Some(Duration::from_millis(100)));

    test_node.fire_patience();

    assert_eq!(test_node.application.committed(), vec![commands(&["a"])]);
    let committed = test_node.node.committed_blocks();
    assert_eq!(committed.len(), 1);

    let status = test_node.node.status();
    assert_eq!(status.committed, committed[0]);
    assert_eq!(status.head, committed[0]);
    assert_eq!(status.genesis, committed[0]);
    assert!(!status.commit_running);
    assert!(test_node.node.quick_proposing());
}

#[test]
fn commit_is_idempotent() {
    let mut cluster = Cluster::new(1);
    cluster.submit(0, "a");
    cluster.node(0).fire_patience();

    let test_node = cluster.node(0);
    let block_id = test_node.node.committed_blocks()[0];
    for request_seq in 0..3 {
        let commit = PaxosMessage::Commit {
            request_seq,
            com_block: block_id,
        };
        test_node
            .node
            .handle_message(NodeMessage::Paxos(commit), Some(7))
            .unwrap();
    }

    assert_eq!(test_node.application.committed().len(), 1);
    assert_eq!(test_node.node.committed_blocks(), vec![block_id]);
}

#[test]
fn three_nodes_agree_and_rebase_genesis() {
    let mut cluster = Cluster::new(3);
    cluster.submit(0, "a");
    cluster.deliver_all();
    cluster.node(0).fire_patience();
    cluster.deliver_all();

    let first = cluster.node(0).node.committed_blocks()[0];
    for test_node in &cluster.nodes {
        assert_eq!(test_node.application.committed(), vec![commands(&["a"])]);
        let status = test_node.node.status();
        assert_eq!(status.committed, first);
        assert_eq!(status.head, first);
        assert_eq!(status.genesis, first);

        let tree = test_node.node.tree();
        assert!(tree.get(&BlockId::GENESIS).is_none());
        assert!(tree.storage().get_block(&BlockId::GENESIS).unwrap().is_none());
    }
    assert_eq!(cluster.node(1).node.role(), Role::Slow);
    let depths = cluster.committed_depths();
    assert_eq!(depths, vec![1, 1, 1]);

    // Late patience timers of the other nodes find nothing to do
    let blocks = cluster.node(1).node.tree().len();
    cluster.node(1).fire_patience();
    assert_eq!(cluster.node(1).node.tree().len(), blocks);

    // The proposer still holds its ticket, the second block skips the first round
    let delivered = cluster.delivered.len();
    cluster.submit(0, "b");
    cluster.deliver_all();
    cluster.node(0).fire_patience();
    cluster.deliver_all();

    let tries = cluster.delivered[delivered..]
        .iter()
        .filter(|(_, message)| matches!(message, NodeMessage::Paxos(PaxosMessage::Try { .. })))
        .count();
    assert_eq!(tries, 0);
    assert_eq!(cluster.committed_depths(), vec![2, 2, 2]);
    assert_depths_grew(&depths, &cluster.committed_depths());

    let second = cluster.node(0).node.committed_blocks()[1];
    for test_node in &cluster.nodes {
        assert_eq!(
            test_node.application.committed(),
            vec![commands(&["a"]), commands(&["b"])]
        );
        assert_eq!(test_node.node.status().genesis, second);

        let tree = test_node.node.tree();
        assert!(tree.get(&first).is_none());
        assert!(tree.storage().get_block(&first).unwrap().is_none());
    }
}

#[test]
fn stale_try_ok_is_ignored() {
    let mut cluster = Cluster::new(3);
    cluster.submit(0, "a");
    let test_node = cluster.node(0);
    test_node.fire_patience();
    assert_eq!(test_node.node.request_seq(), 1);

    // The first attempt gets no answers and times out
    test_node.fire(TimerEvent::CommitTimeout(1));
    assert_eq!(test_node.node.request_seq(), 2);
    assert_eq!(test_node.node.votes(), 0);

    let try_ok = |request_seq, voter| {
        NodeMessage::Paxos(PaxosMessage::TryOk {
            request_seq,
            voter: NodeId(voter),
            proposal_block: None,
            support_block: None,
        })
    };

    test_node.node.handle_message(try_ok(0, 1), Some(1)).unwrap();
    assert_eq!(test_node.node.votes(), 0);

    test_node.node.handle_message(try_ok(2, 1), Some(1)).unwrap();
    test_node.node.handle_message(try_ok(2, 1), Some(1)).unwrap();
    assert_eq!(test_node.node.votes(), 1);
    assert!(proposals(&test_node.transport).is_empty());

    test_node.node.handle_message(try_ok(2, 2), Some(2)).unwrap();
    let proposals = proposals(&test_node.transport);
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].request_seq(), 3);
}

fn deepest_support(deeper_first: bool) {
    let mut cluster = Cluster::new(5);
    let test_node = cluster.node(0);
    let genesis = genesis_of(test_node);

    let support_3 = block_with(1, 10, &genesis, 3);
    let support_5 = block_with(2, 20, &genesis, 5);
    let proposal_3 = block_with(1, 11, &support_3, 1);
    let proposal_5 = block_with(2, 21, &support_5, 1);
    for block in [&support_3, &support_5, &proposal_3, &proposal_5] {
        test_node.node.tree_mut().add(block.clone()).unwrap();
    }

    cluster.submit(0, "a");
    let test_node = cluster.node(0);
    test_node.fire_patience();
    let new_block = test_node.node.status().head;

    let mut answers = vec![
        (1, proposal_3.id, support_3.id),
        (2, proposal_5.id, support_5.id),
    ];
    if deeper_first {
        answers.reverse();
    }
    for (voter, proposal, support) in answers {
        let try_ok = PaxosMessage::TryOk {
            request_seq: 1,
            voter: NodeId(voter),
            proposal_block: Some(proposal),
            support_block: Some(support),
        };
        test_node
            .node
            .handle_message(NodeMessage::Paxos(try_ok), Some(voter as ConnectionId))
            .unwrap();
    }

    assert_eq!(
        proposals(&test_node.transport),
        vec![PaxosMessage::Propose {
            request_seq: 2,
            com_block: proposal_5.id,
            new_block: Some(new_block),
        }]
    );
}

#[test]
fn deepest_support_wins() {
    deepest_support(false);
    deepest_support(true);
}

#[test]
fn missing_blocks_are_recovered() {
    let mut cluster = Cluster::new(2);
    let genesis = genesis_of(cluster.node(0));
    let b1 = block_with(0, 1, &genesis, 1);
    let b2 = block_with(0, 2, &b1, 1);
    let b3 = block_with(0, 3, &b2, 1);
    for block in [&b1, &b2, &b3] {
        cluster.node(0).node.tree_mut().add(block.clone()).unwrap();
    }

    cluster
        .node(1)
        .node
        .handle_message(NodeMessage::Block(b3.clone()), Some(0))
        .unwrap();
    assert_matches!(
        cluster.node(1).node.tree().reach_genesis(&b3),
        Reach::Missing(id) if id == b2.id
    );

    cluster.deliver_all();

    let tree = cluster.node(1).node.tree();
    for block in [&b1, &b2, &b3] {
        assert!(tree.contains(&block.id));
    }
    assert_eq!(tree.reach_genesis(&b3), Reach::Reachable);
}

#[test]
fn recovery_batch_is_bounded() {
    let mut test_node = TestNode::new(0, 2, ConsensusConfiguration::default());
    let mut parent = genesis_of(&test_node);
    for counter in 1..=8 {
        let block = block_with(0, counter, &parent, 1);
        test_node.node.tree_mut().add(block.clone()).unwrap();
        parent = block;
    }

    test_node
        .node
        .handle_message(NodeMessage::RequestBlocks { block_id: parent.id }, Some(1))
        .unwrap();

    let responses = test_node.transport.responses();
    assert_eq!(responses.len(), 1);
    assert_matches!(
        &responses[0],
        (NodeMessage::RespondBlocks { blocks }, 1) if blocks.len() == 6 && blocks[0].id == parent.id
    );
}

#[test]
fn server_state_survives_restart() {
    let config = ConsensusConfiguration::default();
    let mut test_node = TestNode::new(1, 3, config.clone());
    let genesis = genesis_of(&test_node);
    let b1 = block_with(0, 1, &genesis, 1);
    let b2 = block_with(0, 2, &b1, 1);
    test_node.node.tree_mut().add(b1.clone()).unwrap();
    test_node.node.tree_mut().add(b2.clone()).unwrap();

    let try_b1 = |request_seq| {
        NodeMessage::Paxos(PaxosMessage::Try {
            request_seq,
            last_committed_block: BlockId::GENESIS,
            new_block: b1.id,
        })
    };
    test_node.node.handle_message(try_b1(1), Some(0)).unwrap();
    test_node
        .node
        .handle_message(
            NodeMessage::Paxos(PaxosMessage::Propose {
                request_seq: 2,
                com_block: b1.id,
                new_block: Some(b1.id),
            }),
            Some(0),
        )
        .unwrap();
    assert_eq!(test_node.transport.responses().len(), 2);

    let storage = test_node.node.into_tree().into_storage();
    let mut restarted = TestNode::with_storage(1, 3, config, storage);
    assert_eq!(restarted.node.max_block_depth(), 1);

    // Same depth again, no second promise
    restarted.node.handle_message(try_b1(3), Some(0)).unwrap();
    assert!(restarted.transport.responses().is_empty());

    // A deeper block learns about the accepted proposal
    restarted
        .node
        .handle_message(
            NodeMessage::Paxos(PaxosMessage::Try {
                request_seq: 4,
                last_committed_block: BlockId::GENESIS,
                new_block: b2.id,
            }),
            Some(2),
        )
        .unwrap();
    assert_eq!(
        restarted.transport.responses(),
        vec![(
            NodeMessage::Paxos(PaxosMessage::TryOk {
                request_seq: 4,
                voter: NodeId(1),
                proposal_block: Some(b1.id),
                support_block: Some(b1.id),
            }),
            2
        )]
    );
}

#[test]
fn propose_after_deeper_try_is_rejected() {
    let mut test_node = TestNode::new(1, 3, ConsensusConfiguration::default());
    let genesis = genesis_of(&test_node);
    let b1 = block_with(0, 1, &genesis, 1);
    let b2 = block_with(2, 1, &genesis, 2);
    test_node.node.tree_mut().add(b1.clone()).unwrap();
    test_node.node.tree_mut().add(b2.clone()).unwrap();

    for (new_block, connection) in [(b1.id, 0), (b2.id, 2)] {
        let try_msg = PaxosMessage::Try {
            request_seq: 1,
            last_committed_block: BlockId::GENESIS,
            new_block,
        };
        test_node
            .node
            .handle_message(NodeMessage::Paxos(try_msg), Some(connection))
            .unwrap();
    }
    assert_eq!(test_node.node.max_block_depth(), 2);

    let stale_propose = PaxosMessage::Propose {
        request_seq: 2,
        com_block: b1.id,
        new_block: Some(b1.id),
    };
    test_node
        .node
        .handle_message(NodeMessage::Paxos(stale_propose), Some(0))
        .unwrap();
    let quick_propose = PaxosMessage::Propose {
        request_seq: 2,
        com_block: b1.id,
        new_block: None,
    };
    test_node
        .node
        .handle_message(NodeMessage::Paxos(quick_propose), Some(0))
        .unwrap();

    let acks = test_node
        .transport
        .responses()
        .into_iter()
        .filter(|(message, _)| {
            matches!(message, NodeMessage::Paxos(PaxosMessage::ProposeAck { .. }))
        })
        .count();
    assert_eq!(acks, 0);
}

#[test]
fn commit_off_the_committed_chain_fails() {
    let mut test_node = TestNode::new(1, 3, ConsensusConfiguration::default());
    let genesis = genesis_of(&test_node);
    let a = block_with(0, 1, &genesis, 1);
    let c = block_with(2, 1, &genesis, 2);
    test_node.node.tree_mut().add(a.clone()).unwrap();
    test_node.node.tree_mut().add(c.clone()).unwrap();

    let commit = |com_block| NodeMessage::Paxos(PaxosMessage::Commit {
        request_seq: 1,
        com_block,
    });
    test_node.node.handle_message(commit(a.id), Some(0)).unwrap();
    assert_eq!(test_node.node.status().committed, a.id);

    let result = test_node.node.handle_message(commit(c.id), Some(2));
    assert_matches!(
        result,
        Err(ConsensusError::InconsistentCommit { committed, block }) if committed == a.id && block == c.id
    );
}

#[test]
fn overflowing_buffer_rearms_patience() {
    let config = ConsensusConfiguration {
        max_txn_count: 2,
        ..Default::default()
    };
    let mut cluster = Cluster::with_config(1, config);
    for command in ["a", "b", "c"] {
        cluster.submit(0, command);
    }
    let test_node = cluster.node(0);
    assert_eq!(
        test_node.timers.patience_events(),
        vec![TimerEvent::Patience(tx_id(0, 1))]
    );

    test_node.fire_patience();
    assert_eq!(test_node.application.committed(), vec![commands(&["a", "b"])]);
    assert_eq!(
        test_node.timers.patience_events(),
        vec![TimerEvent::Patience(tx_id(0, 3))]
    );

    test_node.fire_patience();
    assert_eq!(
        test_node.application.committed(),
        vec![commands(&["a", "b"]), commands(&["c"])]
    );
}

#[test]
fn slow_node_patience() {
    let mut test_node = TestNode::new(1, 3, ConsensusConfiguration::default());
    test_node.node.set_slow_backoff(0.4);
    test_node.node.submit(b"a".to_vec()).unwrap();

    let expected = Duration::from_secs_f64((2.0 + EPSILON) * 1.0 + 0.4 * 1.0)
        + Duration::from_millis(100);
    assert_eq!(
        test_node.timers.get(&TimerEvent::Patience(tx_id(1, 1))),
        Some(expected)
    );
}

#[test]
fn deeper_block_demotes_fast_node() {
    let mut test_node = TestNode::new(0, 2, ConsensusConfiguration::default());
    assert_eq!(test_node.node.role(), Role::Fast);

    let block = block_with(1, 1, &genesis_of(&test_node), 1);
    test_node
        .node
        .handle_message(NodeMessage::Block(block.clone()), Some(1))
        .unwrap();

    assert_eq!(test_node.node.role(), Role::Slow);
    assert_eq!(test_node.node.status().head, block.id);
}

#[test]
fn running_commit_queues_a_retry() {
    let mut test_node = TestNode::new(0, 3, ConsensusConfiguration::default());
    test_node.node.submit(b"a".to_vec()).unwrap();
    test_node.fire_patience();
    test_node.node.submit(b"b".to_vec()).unwrap();
    test_node.fire_patience();

    assert_eq!(
        test_node.timers.get(&TimerEvent::RetryCommit),
        Some(Duration::from_secs_f64(2.0) + Duration::from_millis(200))
    );
    assert!(test_node.node.status().commit_running);
}

#[test]
fn abandoned_transactions_are_sent_again() {
    let mut test_node = TestNode::new(1, 2, ConsensusConfiguration::default());
    test_node.node.submit(b"x".to_vec()).unwrap();
    test_node.fire_patience();
    assert_eq!(test_node.node.role(), Role::Moderate);
    assert_eq!(test_node.node.status().pending_transactions, 0);
    test_node.transport.drain();

    let deeper = block_with(0, 5, &genesis_of(&test_node), 2);
    test_node
        .node
        .handle_message(NodeMessage::Block(deeper.clone()), Some(0))
        .unwrap();

    let status = test_node.node.status();
    assert_eq!(status.head, deeper.id);
    assert_eq!(status.role, Role::Slow);
    assert_eq!(status.pending_transactions, 1);
    assert!(test_node
        .transport
        .broadcasts()
        .iter()
        .any(|message| matches!(message, NodeMessage::Transaction(tx) if tx.id == tx_id(1, 1))));
    assert!(test_node
        .timers
        .get(&TimerEvent::Patience(tx_id(1, 1)))
        .is_some());
}

#[test]
fn propose_ack_for_another_round_is_ignored() {
    let mut test_node = TestNode::new(0, 3, ConsensusConfiguration::default());
    test_node.node.submit(b"a".to_vec()).unwrap();
    test_node.fire_patience();
    let new_block = test_node.node.status().head;

    // Two attempts time out without answers
    test_node.fire(TimerEvent::CommitTimeout(1));
    test_node.fire(TimerEvent::CommitTimeout(2));
    assert_eq!(test_node.node.request_seq(), 3);
    assert_eq!(test_node.node.votes(), 0);

    for voter in [1, 2] {
        let try_ok = PaxosMessage::TryOk {
            request_seq: 3,
            voter: NodeId(voter),
            proposal_block: None,
            support_block: None,
        };
        test_node
            .node
            .handle_message(NodeMessage::Paxos(try_ok), Some(voter as ConnectionId))
            .unwrap();
    }
    assert_eq!(
        proposals(&test_node.transport),
        vec![PaxosMessage::Propose {
            request_seq: 4,
            com_block: new_block,
            new_block: Some(new_block),
        }]
    );
    // The proposer accepted its own proposal
    assert_eq!(test_node.node.votes(), 1);

    test_node
        .node
        .handle_message(propose_ack(2, 1, new_block), Some(1))
        .unwrap();
    assert_eq!(test_node.node.votes(), 1);

    test_node
        .node
        .handle_message(propose_ack(4, 1, BlockId::GENESIS), Some(1))
        .unwrap();
    assert_eq!(test_node.node.votes(), 1);
    assert!(test_node.node.committed_blocks().is_empty());

    test_node
        .node
        .handle_message(propose_ack(4, 1, new_block), Some(1))
        .unwrap();
    assert_eq!(test_node.node.committed_blocks(), vec![new_block]);
}

#[test]
fn quick_propose_off_the_committed_chain_is_rejected() {
    let mut test_node = TestNode::new(1, 3, ConsensusConfiguration::default());
    let genesis = genesis_of(&test_node);
    let a = block_with(0, 1, &genesis, 1);
    let sibling = block_with(2, 1, &genesis, 2);
    let child = block_with(0, 2, &a, 1);
    for block in [&a, &sibling, &child] {
        test_node.node.tree_mut().add(block.clone()).unwrap();
    }

    let commit = PaxosMessage::Commit {
        request_seq: 1,
        com_block: a.id,
    };
    test_node
        .node
        .handle_message(NodeMessage::Paxos(commit), Some(0))
        .unwrap();
    assert_eq!(test_node.node.max_block_depth(), 0);

    for (com_block, connection) in [(sibling.id, 2), (child.id, 0)] {
        let quick_propose = PaxosMessage::Propose {
            request_seq: 5,
            com_block,
            new_block: None,
        };
        test_node
            .node
            .handle_message(NodeMessage::Paxos(quick_propose), Some(connection))
            .unwrap();
    }

    assert_eq!(
        test_node.transport.responses(),
        vec![(propose_ack(5, 1, child.id), 0)]
    );
}

#[test]
fn overtaken_quick_proposal_is_dropped() {
    let mut cluster = Cluster::new(3);
    cluster.submit(0, "a");
    cluster.deliver_all();
    cluster.node(0).fire_patience();
    cluster.deliver_all();
    assert!(cluster.node(0).node.quick_proposing());
    let depths = cluster.committed_depths();

    // Node 0 quick proposes b, its messages get lost
    cluster.submit(0, "b");
    cluster.node(0).fire_patience();
    let b = cluster.node(0).node.status().head;
    let request_seq = cluster.node(0).node.request_seq();
    assert_eq!(cluster.node(0).node.votes(), 1);
    cluster.node(0).transport.drain();

    // Node 1 commits a sibling of b with the vote of node 0
    cluster.down.insert(2);
    cluster.node(1).node.set_role(Role::Fast);
    cluster.submit(1, "c");
    cluster.node(1).fire_patience();
    cluster.deliver_all();

    let c = cluster.node(1).node.status().committed;
    assert_ne!(c, b);
    assert_eq!(cluster.node(0).node.status().committed, c);
    assert_depths_grew(&depths, &cluster.committed_depths());

    // The acknowledgement of node 2 for b arrives after all
    let test_node = cluster.node(0);
    test_node.transport.drain();
    let result = test_node
        .node
        .handle_message(propose_ack(request_seq, 2, b), Some(2));
    assert_matches!(result, Ok(()));
    assert_eq!(test_node.node.status().committed, c);
    assert_eq!(
        test_node.application.committed(),
        vec![commands(&["a"]), commands(&["c"])]
    );
    assert!(!test_node
        .transport
        .broadcasts()
        .iter()
        .any(|message| matches!(message, NodeMessage::Paxos(PaxosMessage::Commit { .. }))));

    // A later retry doesn't revive b
    test_node.node.set_role(Role::Fast);
    test_node.fire(TimerEvent::RetryCommit);
    assert_eq!(test_node.node.committable(), None);
    assert!(!test_node
        .transport
        .broadcasts()
        .iter()
        .any(|message| matches!(message, NodeMessage::Paxos(_))));
    assert_consistent_logs(&cluster);
}

/// Nodes 0, 1 and 2 all start eager, events happen in a random order and messages get lost.
/// Returns the number of blocks committed over all nodes.
fn run_concurrent_leaders(seed: u64, drop_rate: f64) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cluster = Cluster::new(3);
    for index in [1, 2] {
        cluster.node(index).node.set_role(Role::Fast);
    }

    let mut depths = cluster.committed_depths();
    for step in 0..400 {
        let index = rng.gen_range(0..cluster.nodes.len());
        let result = match rng.gen_range(0..10) {
            0 => cluster
                .node(index)
                .node
                .submit(format!("{seed}-{step}").into_bytes())
                .map(|_| ()),
            1 | 2 => {
                let events = cluster.node(index).timers.events();
                if events.is_empty() {
                    Ok(())
                } else {
                    let event = events[rng.gen_range(0..events.len())];
                    cluster.node(index).try_fire(event)
                }
            }
            _ => cluster.deliver_random(&mut rng, drop_rate).map(|_| ()),
        };
        assert_matches!(result, Ok(()), "seed {seed}, drop rate {drop_rate}, step {step}");

        let now = cluster.committed_depths();
        assert_depths_grew(&depths, &now);
        depths = now;
        assert_consistent_logs(&cluster);
    }

    cluster
        .nodes
        .iter()
        .map(|test_node| test_node.application.committed().len())
        .sum()
}

#[test]
fn concurrent_fast_leaders_agree() {
    let mut committed = 0;
    for seed in 0..100 {
        for drop_rate in [0.0, 0.1] {
            committed += run_concurrent_leaders(seed, drop_rate);
        }
    }
    assert!(committed > 0);
}
