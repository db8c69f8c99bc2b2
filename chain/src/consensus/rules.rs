//! `validate_block`: spec.md §4.7's five-step consensus check.

use crate::pow;
use crate::storage::ChainStore;
use crate::types::block::Merkle;
use crate::types::{Block, Hash256};

use super::ConsensusError;

/// Maximum allowed drift of a header's timestamp into the future, in
/// milliseconds.
const MAX_FUTURE_DRIFT_MS: i64 = 60_000;

/// Validates `block` against `store`, per spec.md §4.7:
/// 1. parent linkage,
/// 2. height monotonicity,
/// 3. Merkle commitment,
/// 4. proof-of-work target,
/// 5. timestamp bounds (strictly after the parent's, not too far ahead of
///    `now_ms`).
///
/// Per spec.md §9 Open Question (1), a non-zero parent hash that is not
/// found in the store is always `UnknownParent`: there is no special case
/// for an empty store.
pub fn validate_block(
    block: &Block,
    store: &dyn ChainStore,
    now_ms: i64,
) -> Result<(), ConsensusError> {
    let parent_hash = block.header.parent_hash;
    let parent_is_zero = parent_hash.0 == Hash256::ZERO;

    let parent_height: i64 = if parent_is_zero {
        -1
    } else {
        store
            .get_height(&parent_hash)
            .ok_or(ConsensusError::UnknownParent)? as i64
    };

    let expected_height = (parent_height + 1) as u64;
    if block.header.height != expected_height {
        return Err(ConsensusError::BadHeight {
            expected: expected_height,
            got: block.header.height,
        });
    }

    let ids: Vec<Hash256> = block.txs.iter().map(|tx| tx.id()).collect();
    if Merkle::root(&ids) != block.header.merkle_root {
        return Err(ConsensusError::MerkleMismatch);
    }

    if !pow::meets_target(block) {
        return Err(ConsensusError::BadProofOfWork);
    }

    if block.header.timestamp_ms > now_ms + MAX_FUTURE_DRIFT_MS {
        return Err(ConsensusError::TimestampOutOfRange);
    }
    if !parent_is_zero {
        let parent_block = store
            .get_block(&parent_hash)
            .ok_or(ConsensusError::UnknownParent)?;
        if block.header.timestamp_ms <= parent_block.header.timestamp_ms {
            return Err(ConsensusError::TimestampOutOfRange);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryChainStore;
    use crate::types::block::{BlockHash, BlockHeader};

    fn header(parent: BlockHash, height: u64, ts: i64, difficulty_bits: u32) -> BlockHeader {
        BlockHeader {
            parent_hash: parent,
            merkle_root: Hash256::ZERO,
            height,
            timestamp_ms: ts,
            difficulty_bits,
            nonce: 0,
        }
    }

    #[test]
    fn genesis_with_zero_parent_and_height_zero_is_valid() {
        let store = InMemoryChainStore::new();
        let genesis = Block::new(
            header(BlockHash(Hash256::ZERO), 0, 1_700_000_000_000, 0),
            vec![],
        )
        .unwrap();

        assert!(validate_block(&genesis, &store, 1_700_000_100_000).is_ok());
    }

    #[test]
    fn unknown_nonzero_parent_is_rejected() {
        let store = InMemoryChainStore::new();
        let bogus_parent = BlockHash(Hash256([9u8; 32]));
        let block = Block::new(header(bogus_parent, 1, 1_700_000_000_000, 0), vec![]).unwrap();

        assert_eq!(
            validate_block(&block, &store, 1_700_000_100_000),
            Err(ConsensusError::UnknownParent)
        );
    }

    #[test]
    fn wrong_height_is_rejected() {
        let store = InMemoryChainStore::new();
        let genesis = Block::new(
            header(BlockHash(Hash256::ZERO), 0, 1_700_000_000_000, 0),
            vec![],
        )
        .unwrap();
        let genesis_hash = store.put_block(genesis).unwrap();

        let bad = Block::new(header(genesis_hash, 5, 1_700_000_001_000, 0), vec![]).unwrap();
        assert_eq!(
            validate_block(&bad, &store, 1_700_000_100_000),
            Err(ConsensusError::BadHeight { expected: 1, got: 5 })
        );
    }

    #[test]
    fn merkle_mismatch_is_rejected() {
        let store = InMemoryChainStore::new();
        let mut block = Block::new(
            header(BlockHash(Hash256::ZERO), 0, 1_700_000_000_000, 0),
            vec![],
        )
        .unwrap();
        block.header.merkle_root = Hash256([1u8; 32]);

        assert_eq!(
            validate_block(&block, &store, 1_700_000_100_000),
            Err(ConsensusError::MerkleMismatch)
        );
    }

    #[test]
    fn timestamp_equal_to_parent_is_rejected() {
        let store = InMemoryChainStore::new();
        let genesis = Block::new(
            header(BlockHash(Hash256::ZERO), 0, 1_700_000_000_000, 0),
            vec![],
        )
        .unwrap();
        let genesis_hash = store.put_block(genesis).unwrap();

        let same_ts = Block::new(header(genesis_hash, 1, 1_700_000_000_000, 0), vec![]).unwrap();
        assert_eq!(
            validate_block(&same_ts, &store, 1_700_000_100_000),
            Err(ConsensusError::TimestampOutOfRange)
        );
    }

    #[test]
    fn timestamp_too_far_in_future_is_rejected() {
        let store = InMemoryChainStore::new();
        let genesis = Block::new(
            header(BlockHash(Hash256::ZERO), 0, 1_700_000_000_000, 0),
            vec![],
        )
        .unwrap();

        assert_eq!(
            validate_block(&genesis, &store, 1_699_999_000_000),
            Err(ConsensusError::TimestampOutOfRange)
        );
    }
}
