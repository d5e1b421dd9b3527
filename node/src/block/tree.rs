use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::block::types::block::Block;
use crate::block::types::id::BlockId;
use crate::block::types::transaction::Transaction;
use crate::storage::{self, PiChainDatabase, StateKey};

/// Outcome of walking from a block towards genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reach {
    Reachable,
    /// This ancestor is not in the tree, it has to be requested from the peers.
    Missing(BlockId),
    /// The block can't be a descendant of the current genesis.
    Detached,
}

/// All candidate blocks known to a node, together with the head, committed and genesis pointers.
///
/// Every mutation is written to storage before the method returns. The head, committed and
/// genesis blocks are always present in the tree.
pub(crate) struct Blocktree {
    blocks: HashMap<BlockId, Block>,
    genesis: BlockId,
    head: BlockId,
    committed: BlockId,
    committed_log: Vec<BlockId>,
    committed_set: HashSet<BlockId>,
    counter: u64,
    storage: Box<dyn PiChainDatabase>,
}

impl Blocktree {
    /// Loads the tree from storage, a fresh store is seeded with the genesis block.
    pub(crate) fn open(storage: Box<dyn PiChainDatabase>) -> anyhow::Result<Self> {
        let mut tree = Blocktree {
            blocks: HashMap::new(),
            genesis: BlockId::GENESIS,
            head: BlockId::GENESIS,
            committed: BlockId::GENESIS,
            committed_log: vec![],
            committed_set: HashSet::new(),
            counter: 0,
            storage,
        };

        let stored = tree.storage.get_blocks()?;
        if stored.is_empty() {
            log::info!("Empty storage, starting from genesis");
            let genesis = Block::genesis();
            tree.storage.store_block(&genesis)?;
            tree.blocks.insert(genesis.id, genesis);
            return Ok(tree);
        }
        for block in stored {
            tree.blocks.insert(block.id, block);
        }

        tree.genesis = tree.load(StateKey::Genesis)?.unwrap_or(BlockId::GENESIS);
        if !tree.blocks.contains_key(&tree.genesis) {
            anyhow::bail!("Genesis block {} is missing from storage", tree.genesis);
        }
        tree.committed = tree.load_pointer(StateKey::CommittedBlock)?;
        tree.head = tree.load_pointer(StateKey::HeadBlock)?;
        tree.committed_log = tree.load(StateKey::CommittedBlocks)?.unwrap_or_default();
        tree.committed_set = tree.committed_log.iter().cloned().collect();
        tree.counter = tree.load(StateKey::Counter)?.unwrap_or(0);

        log::info!(
            "Loaded {} blocks, genesis: {}, committed: {}, head: {}, counter: {}",
            tree.blocks.len(),
            tree.genesis,
            tree.committed,
            tree.head,
            tree.counter
        );
        Ok(tree)
    }

    fn load_pointer(&self, key: StateKey) -> anyhow::Result<BlockId> {
        match self.load::<BlockId>(key)? {
            Some(id) if self.blocks.contains_key(&id) => Ok(id),
            Some(id) => {
                log::warn!("{} points to unknown block {id}, using genesis", key.as_str());
                Ok(self.genesis)
            }
            None => Ok(self.genesis),
        }
    }

    pub(crate) fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub(crate) fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Idempotent, returns false if the block was already present.
    pub(crate) fn add(&mut self, block: Block) -> anyhow::Result<bool> {
        if self.blocks.contains_key(&block.id) {
            return Ok(false);
        }
        self.storage.store_block(&block)?;
        log::trace!("Added {block}");
        self.blocks.insert(block.id, block);
        Ok(true)
    }

    pub(crate) fn head(&self) -> &Block {
        &self.blocks[&self.head]
    }

    pub(crate) fn committed(&self) -> &Block {
        &self.blocks[&self.committed]
    }

    pub(crate) fn genesis(&self) -> &Block {
        &self.blocks[&self.genesis]
    }

    pub(crate) fn set_head(&mut self, id: BlockId) -> anyhow::Result<()> {
        self.store(StateKey::HeadBlock, &id)?;
        self.head = id;
        Ok(())
    }

    pub(crate) fn set_committed(&mut self, id: BlockId) -> anyhow::Result<()> {
        self.store(StateKey::CommittedBlock, &id)?;
        self.committed = id;
        Ok(())
    }

    pub(crate) fn append_committed(&mut self, id: BlockId) -> anyhow::Result<()> {
        self.committed_log.push(id);
        storage::store(
            self.storage.as_mut(),
            StateKey::CommittedBlocks,
            &self.committed_log,
        )?;
        self.committed_set.insert(id);
        Ok(())
    }

    pub(crate) fn committed_log(&self) -> &[BlockId] {
        &self.committed_log
    }

    /// Committed at some point, genesis counts as committed.
    pub(crate) fn is_committed(&self, id: &BlockId) -> bool {
        self.committed_set.contains(id) || *id == self.genesis || *id == BlockId::GENESIS
    }

    /// Next value of the counter shared by blocks and transactions, persisted before it's handed out.
    pub(crate) fn next_counter(&mut self) -> anyhow::Result<u64> {
        let next = self.counter + 1;
        self.store(StateKey::Counter, &next)?;
        self.counter = next;
        Ok(next)
    }

    /// True if `a` is a strict ancestor of `b`.
    pub(crate) fn ancestor(&self, a: &BlockId, b: &BlockId) -> bool {
        let Some(a) = self.blocks.get(a) else {
            return false;
        };
        let mut current = self.blocks.get(b);
        while let Some(block) = current {
            if block.depth < a.depth {
                return false;
            }
            match block.parent {
                Some(parent) if parent == a.id => return true,
                Some(parent) => current = self.blocks.get(&parent),
                None => return false,
            }
        }
        false
    }

    /// Deepest block that is an ancestor of (or equal to) both `a` and `b`.
    pub(crate) fn common_ancestor(&self, a: &BlockId, b: &BlockId) -> Option<BlockId> {
        let mut a = self.blocks.get(a)?;
        let mut b = self.blocks.get(b)?;
        while a.id != b.id {
            if a.depth >= b.depth {
                a = self.blocks.get(&a.parent?)?;
            } else {
                b = self.blocks.get(&b.parent?)?;
            }
        }
        Some(a.id)
    }

    /// Structural validity: known parent, non-empty, depth derived from the parent.
    pub(crate) fn valid(&self, block: &Block) -> bool {
        let Some(parent) = block.parent.and_then(|p| self.blocks.get(&p)) else {
            return false;
        };
        !block.txs.is_empty() && block.depth == parent.depth + block.txs.len() as u64
    }

    /// Walks the parent links of `block`, which doesn't have to be in the tree yet.
    pub(crate) fn reach_genesis(&self, block: &Block) -> Reach {
        let genesis = self.genesis();
        let mut current = block;
        loop {
            if current.id == genesis.id {
                return Reach::Reachable;
            }
            if current.depth <= genesis.depth {
                return Reach::Detached;
            }
            let Some(parent) = current.parent else {
                return Reach::Detached;
            };
            match self.blocks.get(&parent) {
                Some(parent) => current = parent,
                None => return Reach::Missing(parent),
            }
        }
    }

    /// Blocks after `from` up to and including `to`, oldest first. `None` if `from` is not an
    /// ancestor of `to` or the chain between them is incomplete.
    pub(crate) fn path(&self, from: &BlockId, to: &BlockId) -> Option<Vec<Block>> {
        let from_depth = self.blocks.get(from)?.depth;
        let mut path = vec![];
        let mut current = self.blocks.get(to)?;
        while current.id != *from {
            if current.depth <= from_depth {
                return None;
            }
            path.push(current.clone());
            current = self.blocks.get(&current.parent?)?;
        }
        path.reverse();
        Some(path)
    }

    /// Transactions of the blocks from `from` up to, but excluding, `until`.
    pub(crate) fn branch_transactions(&self, from: &BlockId, until: &BlockId) -> Vec<Transaction> {
        let mut txs = vec![];
        let mut current = self.blocks.get(from);
        while let Some(block) = current {
            if block.id == *until {
                break;
            }
            txs.extend(block.txs.iter().cloned());
            current = block.parent.and_then(|p| self.blocks.get(&p));
        }
        txs
    }

    /// The block followed by up to `count` of its ancestors, genesis excluded.
    pub(crate) fn recovery_batch(&self, id: &BlockId, count: usize) -> Vec<Block> {
        let Some(block) = self.blocks.get(id) else {
            return vec![];
        };
        let mut batch = vec![block.clone()];
        let mut current = block;
        while batch.len() <= count && current.id != self.genesis {
            match current.parent.and_then(|p| self.blocks.get(&p)) {
                Some(parent) if parent.id != self.genesis => {
                    batch.push(parent.clone());
                    current = parent;
                }
                _ => break,
            }
        }
        batch
    }

    /// Makes `id` the new genesis. Its ancestors are evicted from memory and storage and returned.
    pub(crate) fn rebase_genesis(&mut self, id: &BlockId) -> anyhow::Result<Vec<Block>> {
        let Some(new_genesis) = self.blocks.get(id) else {
            anyhow::bail!("Can't rebase genesis to unknown block {id}");
        };
        let mut parent = new_genesis.parent;

        self.store(StateKey::Genesis, id)?;
        self.genesis = *id;

        let mut evicted = vec![];
        while let Some(parent_id) = parent {
            self.storage.delete_block(&parent_id)?;
            match self.blocks.remove(&parent_id) {
                Some(block) => {
                    parent = block.parent;
                    evicted.push(block);
                }
                None => break,
            }
        }
        if !self.blocks.contains_key(&self.head) {
            self.set_head(*id)?;
        }
        if !self.blocks.contains_key(&self.committed) {
            self.set_committed(*id)?;
        }
        self.storage.compact()?;

        log::debug!("New genesis {id}, evicted {} blocks", evicted.len());
        Ok(evicted)
    }

    pub(crate) fn load<T: DeserializeOwned>(&self, key: StateKey) -> anyhow::Result<Option<T>> {
        storage::load(self.storage.as_ref(), key)
    }

    pub(crate) fn store<T: Serialize>(&mut self, key: StateKey, value: &T) -> anyhow::Result<()> {
        storage::store(self.storage.as_mut(), key, value)
    }

    pub(crate) fn delete(&mut self, key: StateKey) -> anyhow::Result<()> {
        self.storage.delete_value(key)
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &dyn PiChainDatabase {
        self.storage.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn into_storage(self) -> Box<dyn PiChainDatabase> {
        self.storage
    }
}
