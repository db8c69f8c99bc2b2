//! Chain store: persistent map of blocks, heights, children, cumulative
//! work, and head. See spec.md §4.8.
//!
//! Two implementations sit behind the [`ChainStore`] trait: an in-memory
//! store ([`mem::InMemoryChainStore`]) suitable for tests, and a RocksDB-
//! backed store ([`rocksdb::RocksDbChainStore`]) for production. Both
//! partition the five logical key families so that iterating one family
//! stays cheap.

pub mod error;
pub mod mem;
pub mod rocksdb;

pub use error::StorageError;
pub use mem::InMemoryChainStore;
pub use rocksdb::{RocksDbChainStore, RocksDbConfig};

use crate::types::{Block, BlockHash};
use crate::work::Work;

/// Content-addressed, fork-aware block store.
///
/// Implementations hold their own internal synchronization (spec.md §5:
/// "Mempool, state store, and chain store each hold their own mutex"), so
/// every method takes `&self`.
pub trait ChainStore {
    /// Atomically persists `block` and updates the height/children/work
    /// indices, re-evaluating `head` per spec.md §4.8's head-selection rule.
    /// Returns the block's hash.
    fn put_block(&self, block: Block) -> Result<BlockHash, StorageError>;

    fn get_block(&self, hash: &BlockHash) -> Option<Block>;

    fn get_head(&self) -> Option<BlockHash>;

    /// Fails with [`StorageError::UnknownHash`] if `hash` is not a stored
    /// block.
    fn set_head(&self, hash: BlockHash) -> Result<(), StorageError>;

    fn get_height(&self, hash: &BlockHash) -> Option<u64>;

    fn get_total_work(&self, hash: &BlockHash) -> Option<Work>;

    fn get_children(&self, parent_hash: &BlockHash) -> Vec<BlockHash>;

    fn size(&self) -> usize;

    /// Walks from `head` back to genesis via parent links, then reverses,
    /// yielding blocks in ascending height order.
    fn blocks_in_order(&self) -> Vec<Block>;
}
