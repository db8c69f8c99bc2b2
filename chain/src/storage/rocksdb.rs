//! RocksDB-backed chain store.
//!
//! Persists the five logical families of spec.md §4.8 as dedicated column
//! families so that iterating one (e.g. `heights` for a block explorer)
//! never touches another:
//!
//! - `"blocks"`:   `BlockHash` (32 bytes) -> canonical block bytes.
//! - `"heights"`:  `BlockHash` -> `u64` big-endian.
//! - `"meta"`:     the literal key `"head"` -> `BlockHash` (32 bytes).
//! - `"children"`: `BlockHash` -> concatenation of 32-byte child hashes.
//! - `"work"`:     `BlockHash` -> 32-byte big-endian cumulative work.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DB, Options};

use crate::types::{Block, BlockHash, HASH_LEN, Hash256};
use crate::work::Work;

use super::{ChainStore, StorageError};

const CF_BLOCKS: &str = "blocks";
const CF_HEIGHTS: &str = "heights";
const CF_META: &str = "meta";
const CF_CHILDREN: &str = "children";
const CF_WORK: &str = "work";
const META_HEAD_KEY: &[u8] = b"head";

/// Configuration for [`RocksDbChainStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/chain-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`ChainStore`].
///
/// `put_block`'s multi-key write goes through a single [`rocksdb::WriteBatch`]
/// so that a crash mid-write leaves either every key present or none, per
/// spec.md §4.8.
pub struct RocksDbChainStore {
    db: DB,
    // `put_block` reads `head`'s work before deciding whether to replace it,
    // then writes both `head` and the new entry; serialize the whole
    // read-decide-write sequence so concurrent ticks can't race.
    commit_lock: Mutex<()>,
}

impl RocksDbChainStore {
    /// Opens (or creates) a RocksDB-backed chain store at `cfg.path`.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_HEIGHTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_CHILDREN, Options::default()),
            ColumnFamilyDescriptor::new(CF_WORK, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db,
            commit_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::BackendFailure(format!("missing column family {name}")))
    }

    fn read_hash(&self, cf_name: &'static str, key: &[u8]) -> Result<Option<BlockHash>, StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key)? {
            None => Ok(None),
            Some(bytes) if bytes.len() == HASH_LEN => {
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(&bytes);
                Ok(Some(BlockHash(Hash256(arr))))
            }
            Some(_) => Err(StorageError::BackendFailure("corrupted hash value".into())),
        }
    }

    fn read_work(&self, hash: &BlockHash) -> Result<Option<Work>, StorageError> {
        let cf = self.cf(CF_WORK)?;
        match self.db.get_cf(&cf, hash.0.as_bytes())? {
            None => Ok(None),
            Some(bytes) if bytes.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Some(Work(arr)))
            }
            Some(_) => Err(StorageError::BackendFailure("corrupted work value".into())),
        }
    }
}

impl ChainStore for RocksDbChainStore {
    fn put_block(&self, block: Block) -> Result<BlockHash, StorageError> {
        let _guard = self.commit_lock.lock().expect("chain store mutex poisoned");

        let hash = block.hash();
        let parent = block.header.parent_hash;
        let parent_is_zero = parent.0 == Hash256::ZERO;

        let parent_work = if parent_is_zero {
            Work::ZERO
        } else {
            self.read_work(&parent)?
                .ok_or_else(|| StorageError::BackendFailure("unknown parent work".into()))?
        };
        let new_work = parent_work
            .checked_add(&crate::pow::block_work(block.header.difficulty_bits))
            .ok_or_else(|| StorageError::BackendFailure("cumulative work overflow".into()))?;

        let cf_blocks = self.cf(CF_BLOCKS)?;
        let cf_heights = self.cf(CF_HEIGHTS)?;
        let cf_children = self.cf(CF_CHILDREN)?;
        let cf_work = self.cf(CF_WORK)?;
        let cf_meta = self.cf(CF_META)?;

        let mut children_bytes = if parent_is_zero {
            Vec::new()
        } else {
            self.db.get_cf(&cf_children, parent.0.as_bytes())?.unwrap_or_default()
        };
        if !children_bytes.chunks_exact(HASH_LEN).any(|c| c == hash.0.as_bytes()) {
            children_bytes.extend_from_slice(hash.0.as_bytes());
        }

        let current_head = self.read_hash(CF_META, META_HEAD_KEY)?;
        let should_update_head = match current_head {
            None => true,
            Some(head) => {
                let head_work = self
                    .read_work(&head)?
                    .ok_or_else(|| StorageError::BackendFailure("missing head work".into()))?;
                let head_height = self
                    .db
                    .get_cf(&cf_heights, head.0.as_bytes())?
                    .map(|b| u64::from_be_bytes(b.try_into().unwrap_or([0u8; 8])))
                    .unwrap_or(0);
                new_work > head_work || (new_work == head_work && block.header.height > head_height)
            }
        };

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(&cf_blocks, hash.0.as_bytes(), block.serialize());
        batch.put_cf(&cf_heights, hash.0.as_bytes(), block.header.height.to_be_bytes());
        batch.put_cf(&cf_work, hash.0.as_bytes(), new_work.as_bytes());
        if !parent_is_zero {
            batch.put_cf(&cf_children, parent.0.as_bytes(), children_bytes);
        }
        if should_update_head {
            batch.put_cf(&cf_meta, META_HEAD_KEY, hash.0.as_bytes());
        }

        self.db.write(batch)?;

        Ok(hash)
    }

    fn get_block(&self, hash: &BlockHash) -> Option<Block> {
        let cf = self.cf(CF_BLOCKS).ok()?;
        let bytes = self.db.get_cf(&cf, hash.0.as_bytes()).ok()??;
        Block::decode(&bytes).ok()
    }

    fn get_head(&self) -> Option<BlockHash> {
        self.read_hash(CF_META, META_HEAD_KEY).ok().flatten()
    }

    fn set_head(&self, hash: BlockHash) -> Result<(), StorageError> {
        if self.get_block(&hash).is_none() {
            return Err(StorageError::UnknownHash);
        }
        let cf = self.cf(CF_META)?;
        self.db.put_cf(&cf, META_HEAD_KEY, hash.0.as_bytes())?;
        Ok(())
    }

    fn get_height(&self, hash: &BlockHash) -> Option<u64> {
        let cf = self.cf(CF_HEIGHTS).ok()?;
        let bytes = self.db.get_cf(&cf, hash.0.as_bytes()).ok()??;
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }

    fn get_total_work(&self, hash: &BlockHash) -> Option<Work> {
        self.read_work(hash).ok().flatten()
    }

    fn get_children(&self, parent_hash: &BlockHash) -> Vec<BlockHash> {
        let Ok(cf) = self.cf(CF_CHILDREN) else {
            return Vec::new();
        };
        let Ok(Some(bytes)) = self.db.get_cf(&cf, parent_hash.0.as_bytes()) else {
            return Vec::new();
        };
        bytes
            .chunks_exact(HASH_LEN)
            .map(|c| {
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(c);
                BlockHash(Hash256(arr))
            })
            .collect()
    }

    fn size(&self) -> usize {
        let Ok(cf) = self.cf(CF_BLOCKS) else {
            return 0;
        };
        self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start).count()
    }

    fn blocks_in_order(&self) -> Vec<Block> {
        let mut out = Vec::new();
        let mut cursor = self.get_head();
        while let Some(hash) = cursor {
            let Some(block) = self.get_block(&hash) else {
                break;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::BlockHeader;
    use tempfile::TempDir;

    fn block(parent: BlockHash, height: u64, difficulty_bits: u32) -> Block {
        let header = BlockHeader {
            parent_hash: parent,
            merkle_root: Hash256::ZERO,
            height,
            timestamp_ms: 1_700_000_000_000 + height as i64,
            difficulty_bits,
            nonce: 0,
        };
        Block::new(header, vec![]).unwrap()
    }

    fn open_tmp() -> (TempDir, RocksDbChainStore) {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksDbChainStore::open(&cfg).expect("open rocksdb");
        (tmp, store)
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let (_tmp, store) = open_tmp();
        let genesis = block(BlockHash(Hash256::ZERO), 0, 0);
        let hash = store.put_block(genesis).unwrap();

        let fetched = store.get_block(&hash).expect("block should exist");
        assert_eq!(fetched.header.height, 0);
        assert_eq!(store.get_head(), Some(hash));
    }

    #[test]
    fn children_and_work_indices_are_populated() {
        let (_tmp, store) = open_tmp();
        let genesis = block(BlockHash(Hash256::ZERO), 0, 0);
        let genesis_hash = store.put_block(genesis).unwrap();

        let child = block(genesis_hash, 1, 4);
        let child_hash = store.put_block(child).unwrap();

        assert!(store.get_children(&genesis_hash).contains(&child_hash));
        assert!(store.get_total_work(&child_hash) > store.get_total_work(&genesis_hash));
    }

    #[test]
    fn set_head_rejects_unknown_hash() {
        let (_tmp, store) = open_tmp();
        let genesis = block(BlockHash(Hash256::ZERO), 0, 0);
        store.put_block(genesis).unwrap();

        let bogus = BlockHash(Hash256([7u8; HASH_LEN]));
        assert!(matches!(store.set_head(bogus), Err(StorageError::UnknownHash)));
    }
}
