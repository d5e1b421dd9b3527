//! # Blocks
//!
//! A block batches transactions and points to its parent. Blocks from all nodes form a tree rooted
//! at genesis. A node builds new blocks on its current head, and consensus decides which branch of
//! the tree is committed.
//!
//! The depth of a block is the number of transactions on the path from genesis to it. Deeper
//! blocks win: a node that sees a block deeper than its own head moves there and gives up its
//! eagerness to propose.
//!
//! Once every node has acknowledged a committed block it becomes the new genesis, and everything
//! older is removed from memory and storage.

pub(crate) mod pool;
pub(crate) mod tree;
pub(crate) mod types;
