use std::collections::{HashSet, VecDeque};

use crate::block::types::id::TransactionId;
use crate::block::types::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolInsert {
    /// Seen before, ignored.
    Duplicate,
    Buffered,
    /// The buffer was empty, the transaction is now the oldest one.
    BufferedFirst(TransactionId),
}

/// Transactions seen so far and those not yet part of any block.
pub(crate) struct TransactionPool {
    known: HashSet<TransactionId>,
    pending: VecDeque<Transaction>,
    /// The transaction the patience timer was armed for.
    oldest: Option<TransactionId>,
}

impl TransactionPool {
    pub(crate) fn new() -> Self {
        Self {
            known: HashSet::new(),
            pending: VecDeque::new(),
            oldest: None,
        }
    }

    pub(crate) fn insert(&mut self, tx: Transaction) -> PoolInsert {
        if !self.known.insert(tx.id) {
            return PoolInsert::Duplicate;
        }
        self.buffer(tx)
    }

    /// Buffers a transaction again even though it has been seen, used when its block was abandoned.
    pub(crate) fn requeue(&mut self, tx: Transaction) -> PoolInsert {
        if self.is_pending(&tx.id) {
            return PoolInsert::Duplicate;
        }
        self.known.insert(tx.id);
        self.buffer(tx)
    }

    fn buffer(&mut self, tx: Transaction) -> PoolInsert {
        let id = tx.id;
        self.pending.push_back(tx);
        if self.pending.len() == 1 {
            self.oldest = Some(id);
            PoolInsert::BufferedFirst(id)
        } else {
            PoolInsert::Buffered
        }
    }

    #[cfg(test)]
    pub(crate) fn is_known(&self, id: &TransactionId) -> bool {
        self.known.contains(id)
    }

    pub(crate) fn mark_known(&mut self, id: TransactionId) {
        self.known.insert(id);
    }

    pub(crate) fn forget(&mut self, id: &TransactionId) {
        self.known.remove(id);
    }

    pub(crate) fn is_pending(&self, id: &TransactionId) -> bool {
        self.pending.iter().any(|tx| tx.id == *id)
    }

    pub(crate) fn remove_pending(&mut self, id: &TransactionId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|tx| tx.id != *id);
        before != self.pending.len()
    }

    /// Takes up to `max` transactions, oldest first.
    pub(crate) fn take(&mut self, max: usize) -> Vec<Transaction> {
        let count = max.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// If the oldest buffered transaction is not the one the timer was armed for, it becomes the
    /// new oldest. Returns the previous oldest and the new one.
    pub(crate) fn readjust(&mut self) -> Option<(Option<TransactionId>, TransactionId)> {
        let front = self.pending.front()?.id;
        if self.oldest == Some(front) {
            return None;
        }
        let previous = self.oldest.replace(front);
        Some((previous, front))
    }
}
