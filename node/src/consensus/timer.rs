use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::time::delay_queue::Key;
use tokio_util::time::DelayQueue;

use crate::block::types::id::TransactionId;

/// Deferred work of the consensus node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerEvent {
    /// The oldest buffered transaction waited long enough, a block may be created.
    Patience(TransactionId),
    /// Voting attempt with this number should have finished by now.
    CommitTimeout(u64),
    /// Retry a commit which couldn't start because another attempt was running.
    RetryCommit,
}

pub(crate) trait Timers: Send {
    /// Scheduling an already scheduled event moves its deadline.
    fn schedule(&mut self, event: TimerEvent, after: Duration);

    fn cancel(&mut self, event: &TimerEvent);
}

#[derive(Debug)]
pub(crate) enum TimerCommand {
    Schedule(TimerEvent, Duration),
    Cancel(TimerEvent),
}

/// Forwards timer requests of the node to the [`TimerQueue`] polled by the main loop.
pub(crate) struct ChannelTimers {
    commands: mpsc::UnboundedSender<TimerCommand>,
}

impl ChannelTimers {
    pub(crate) fn new() -> (ChannelTimers, mpsc::UnboundedReceiver<TimerCommand>) {
        let (commands, rcv) = mpsc::unbounded_channel();
        (ChannelTimers { commands }, rcv)
    }

    fn send(&self, cmd: TimerCommand) {
        if let Err(err) = self.commands.send(cmd) {
            log::error!("Timer queue is gone, dropping {:?}", err.0);
        }
    }
}

impl Timers for ChannelTimers {
    fn schedule(&mut self, event: TimerEvent, after: Duration) {
        self.send(TimerCommand::Schedule(event, after));
    }

    fn cancel(&mut self, event: &TimerEvent) {
        self.send(TimerCommand::Cancel(*event));
    }
}

/// A delay queue with at most one pending entry per event.
pub(crate) struct TimerQueue {
    queue: DelayQueue<TimerEvent>,
    keys: HashMap<TimerEvent, Key>,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    pub(crate) fn apply(&mut self, cmd: TimerCommand) {
        match cmd {
            TimerCommand::Schedule(event, after) => self.schedule(event, after),
            TimerCommand::Cancel(event) => self.cancel(&event),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Next expired event. Returns `None` immediately when nothing is scheduled.
    pub(crate) async fn next(&mut self) -> Option<TimerEvent> {
        let expired = self.queue.next().await?;
        let event = expired.into_inner();
        self.keys.remove(&event);
        Some(event)
    }
}

impl Timers for TimerQueue {
    fn schedule(&mut self, event: TimerEvent, after: Duration) {
        match self.keys.get(&event) {
            Some(key) => self.queue.reset(key, after),
            None => {
                let key = self.queue.insert(event, after);
                self.keys.insert(event, key);
            }
        }
    }

    fn cancel(&mut self, event: &TimerEvent) {
        if let Some(key) = self.keys.remove(event) {
            self.queue.remove(&key);
        }
    }
}
