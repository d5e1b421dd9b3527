use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::block::types::id::NodeId;

pub(crate) const EPSILON: f64 = 0.001;

/// Added to the largest observed round trip time.
const RTT_MARGIN: f64 = 0.1;

/// Used until the first pong arrives, in seconds.
const INITIAL_EXPECTED_RTT: f64 = 1.0;

/// How eager a node is to turn buffered transactions into a block. `Fast` is the most eager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub(crate) enum Role {
    Fast,
    Moderate,
    Slow,
}

impl Role {
    /// Node 0 starts eager, everybody else waits.
    pub(crate) fn bootstrap(node: NodeId) -> Role {
        if node.0 == 0 {
            Role::Fast
        } else {
            Role::Slow
        }
    }

    /// One step more eager.
    pub(crate) fn promoted(self) -> Role {
        match self {
            Role::Fast | Role::Moderate => Role::Fast,
            Role::Slow => Role::Moderate,
        }
    }
}

/// Round trip time estimation and the patience derived from it.
pub(crate) struct Timing {
    rtts: HashMap<NodeId, f64>,
    expected_rtt: f64,
    slow_backoff: Option<f64>,
    cluster_size: usize,
    accumulation_time: Duration,
}

impl Timing {
    pub(crate) fn new(cluster_size: usize, accumulation_time: Duration) -> Self {
        Self {
            rtts: HashMap::new(),
            expected_rtt: INITIAL_EXPECTED_RTT,
            slow_backoff: None,
            cluster_size,
            accumulation_time,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_slow_backoff(mut self, backoff: f64) -> Self {
        self.slow_backoff = Some(backoff);
        self
    }

    /// Records a round trip sample in seconds.
    pub(crate) fn update_rtt(&mut self, peer: NodeId, rtt: f64) {
        self.rtts.insert(peer, rtt);
        let max = self.rtts.values().cloned().fold(0.0, f64::max);
        self.expected_rtt = max + RTT_MARGIN;
        log::trace!("RTT to {peer} is {rtt}s, expected RTT {}s", self.expected_rtt);
    }

    pub(crate) fn expected_rtt(&self) -> f64 {
        self.expected_rtt
    }

    /// How long a node in `role` waits before turning its oldest buffered transaction into a block.
    pub(crate) fn patience(&mut self, role: Role) -> Duration {
        let rtt = self.expected_rtt;
        let patience = match role {
            Role::Fast => 0.0,
            Role::Moderate => (1.0 + EPSILON) * rtt,
            Role::Slow => {
                let backoff = self.slow_backoff();
                (2.0 + EPSILON) * rtt + backoff * rtt
            }
        };
        Duration::from_secs_f64(patience) + self.accumulation_time
    }

    /// Time a voting attempt gets before it is abandoned.
    pub(crate) fn commit_timeout(&self, max_commit_time: Duration) -> Duration {
        Duration::from_secs_f64(2.0 * self.expected_rtt) + max_commit_time
    }

    //Drawn once, so that in expectation only one slow node fires first
    fn slow_backoff(&mut self) -> f64 {
        let cluster_size = self.cluster_size as f64;
        *self
            .slow_backoff
            .get_or_insert_with(|| rand::thread_rng().gen_range(0.0..cluster_size.max(1.0)) * 0.5)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fast_is_most_eager() {
        assert!(Role::Fast < Role::Moderate);
        assert!(Role::Moderate < Role::Slow);
    }

    #[test]
    fn promotion_is_one_step() {
        assert_eq!(Role::Slow.promoted(), Role::Moderate);
        assert_eq!(Role::Moderate.promoted(), Role::Fast);
        assert_eq!(Role::Fast.promoted(), Role::Fast);
    }

    #[test]
    fn only_node_zero_starts_fast() {
        assert_eq!(Role::bootstrap(NodeId(0)), Role::Fast);
        assert_eq!(Role::bootstrap(NodeId(1)), Role::Slow);
    }

    #[test]
    fn slow_patience_with_fixed_backoff() {
        let accumulation = Duration::from_millis(100);
        let mut timing = Timing::new(3, accumulation).with_slow_backoff(0.4);

        let patience = timing.patience(Role::Slow);

        let expected = Duration::from_secs_f64((2.0 + EPSILON) * 1.0 + 0.4 * 1.0) + accumulation;
        assert_eq!(patience, expected);
        assert!((patience.as_secs_f64() - 2.501).abs() < 1e-6);
    }

    #[test]
    fn fast_and_moderate_patience() {
        let accumulation = Duration::from_millis(100);
        let mut timing = Timing::new(3, accumulation);

        assert_eq!(timing.patience(Role::Fast), accumulation);
        let moderate = timing.patience(Role::Moderate);
        assert!((moderate.as_secs_f64() - 1.101).abs() < 1e-6);
    }

    #[test]
    fn slow_backoff_is_drawn_once() {
        let mut timing = Timing::new(4, Duration::ZERO);
        let first = timing.patience(Role::Slow);
        let second = timing.patience(Role::Slow);
        assert_eq!(first, second);
        assert!(first.as_secs_f64() >= 2.001);
        assert!(first.as_secs_f64() < 2.001 + 2.0);
    }

    #[test]
    fn expected_rtt_follows_largest_sample() {
        let mut timing = Timing::new(3, Duration::ZERO);
        timing.update_rtt(NodeId(1), 0.2);
        timing.update_rtt(NodeId(2), 0.05);
        assert!((timing.expected_rtt() - 0.3).abs() < 1e-9);

        timing.update_rtt(NodeId(1), 0.01);
        assert!((timing.expected_rtt() - 0.15).abs() < 1e-9);
    }
}
