//! In-memory chain store.
//!
//! Suitable for tests and small devnets. Keeps the five logical families of
//! spec.md §4.8 (`blocks`, `heights`, `meta`, `children`, `work`) as plain
//! in-process maps behind a single mutex, giving the atomic-multi-key-write
//! guarantee of `put_block` for free.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{Block, BlockHash, Hash256};
use crate::work::Work;

use super::{ChainStore, StorageError};

struct Inner {
    blocks: HashMap<BlockHash, Block>,
    heights: HashMap<BlockHash, u64>,
    children: HashMap<BlockHash, Vec<BlockHash>>,
    work: HashMap<BlockHash, Work>,
    head: Option<BlockHash>,
}

/// Thread-safe in-memory implementation of [`ChainStore`].
pub struct InMemoryChainStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                blocks: HashMap::new(),
                heights: HashMap::new(),
                children: HashMap::new(),
                work: HashMap::new(),
                head: None,
            }),
        }
    }
}

impl ChainStore for InMemoryChainStore {
    fn put_block(&self, block: Block) -> Result<BlockHash, StorageError> {
        let hash = block.hash();
        let parent = block.header.parent_hash;
        let parent_is_zero = parent.0 == Hash256::ZERO;

        let mut inner = self.inner.lock().expect("chain store mutex poisoned");

        let parent_work = if parent_is_zero {
            Work::ZERO
        } else {
            *inner
                .work
                .get(&parent)
                .ok_or_else(|| StorageError::BackendFailure("unknown parent work".into()))?
        };
        let new_work = parent_work
            .checked_add(&crate::pow::block_work(block.header.difficulty_bits))
            .ok_or_else(|| StorageError::BackendFailure("cumulative work overflow".into()))?;

        inner.heights.insert(hash, block.header.height);
        inner.work.insert(hash, new_work);
        if !parent_is_zero {
            let siblings = inner.children.entry(parent).or_default();
            if !siblings.contains(&hash) {
                siblings.push(hash);
            }
        }
        inner.blocks.insert(hash, block);

        let should_update_head = match inner.head {
            None => true,
            Some(current) => {
                let current_work = inner.work[&current];
                let current_height = inner.heights[&current];
                new_work > current_work
                    || (new_work == current_work && block_height(&inner, hash) > current_height)
            }
        };
        if should_update_head {
            inner.head = Some(hash);
        }

        Ok(hash)
    }

    fn get_block(&self, hash: &BlockHash) -> Option<Block> {
        self.inner
            .lock()
            .expect("chain store mutex poisoned")
            .blocks
            .get(hash)
            .cloned()
    }

    fn get_head(&self) -> Option<BlockHash> {
        self.inner.lock().expect("chain store mutex poisoned").head
    }

    fn set_head(&self, hash: BlockHash) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("chain store mutex poisoned");
        if !inner.blocks.contains_key(&hash) {
            return Err(StorageError::UnknownHash);
        }
        inner.head = Some(hash);
        Ok(())
    }

    fn get_height(&self, hash: &BlockHash) -> Option<u64> {
        self.inner
            .lock()
            .expect("chain store mutex poisoned")
            .heights
            .get(hash)
            .copied()
    }

    fn get_total_work(&self, hash: &BlockHash) -> Option<Work> {
        self.inner
            .lock()
            .expect("chain store mutex poisoned")
            .work
            .get(hash)
            .copied()
    }

    fn get_children(&self, parent_hash: &BlockHash) -> Vec<BlockHash> {
        self.inner
            .lock()
            .expect("chain store mutex poisoned")
            .children
            .get(parent_hash)
            .cloned()
            .unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.inner.lock().expect("chain store mutex poisoned").blocks.len()
    }

    fn blocks_in_order(&self) -> Vec<Block> {
        let inner = self.inner.lock().expect("chain store mutex poisoned");
        let mut out = Vec::new();
        let mut cursor = inner.head;
        while let Some(hash) = cursor {
            let block = match inner.blocks.get(&hash) {
                Some(b) => b.clone(),
                None => break,
            };
            let parent = block.header.parent_hash;
            out.push(block);
            if parent.0 == Hash256::ZERO {
                break;
            }
            cursor = Some(parent);
        }
        out.reverse();
        out
    }
}

fn block_height(inner: &Inner, hash: BlockHash) -> u64 {
    inner.heights.get(&hash).copied().unwrap_or(0)
}
