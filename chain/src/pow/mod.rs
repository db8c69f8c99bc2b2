//! Proof-of-Work target test and nonce search.
//!
//! See spec.md §4.6. Difficulty is expressed as a count of required leading
//! zero *bits* in the header's SHA-256 hash, not a fractional "target"
//! value: simpler to reason about and to test than a big-integer target.

use crate::types::Block;
use crate::work::Work;

/// Returns `true` if `block`'s header hash has at least `difficulty_bits`
/// leading zero bits. `difficulty_bits <= 0` is trivially satisfied.
pub fn meets_target(block: &Block) -> bool {
    let bits = block.header.difficulty_bits;
    if bits == 0 {
        return true;
    }
    block.header.hash().leading_zero_bits() >= bits
}

/// Searches for a nonce that satisfies [`meets_target`], starting from the
/// template's current nonce and trying up to `max_tries` values. The
/// timestamp is held constant across the search per spec.md §9
/// ("determinism over convenience"): only `nonce` varies.
///
/// Returns the first satisfying block together with the number of nonce
/// iterations it took (1-based), or `None` if `max_tries` is exhausted.
pub fn mine(mut template: Block, max_tries: u64) -> Option<(Block, u64)> {
    let start = template.header.nonce;
    for offset in 0..max_tries {
        template.header.nonce = start.wrapping_add(offset);
        if meets_target(&template) {
            return Some((template, offset + 1));
        }
    }
    None
}

/// Work contributed by a single header: `1 << difficulty_bits`, or `1` if
/// `difficulty_bits <= 0`. Bits above 256 are clamped since no hash can
/// exceed 256 leading zero bits.
pub fn block_work(difficulty_bits: u32) -> Work {
    Work::from_shift(difficulty_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::{BlockHash, BlockHeader};
    use crate::types::Hash256;

    fn template(difficulty_bits: u32) -> Block {
        let header = BlockHeader {
            parent_hash: BlockHash(Hash256::ZERO),
            merkle_root: Hash256::ZERO,
            height: 1,
            timestamp_ms: 1_700_000_000_000,
            difficulty_bits,
            nonce: 0,
        };
        Block::new(header, vec![]).unwrap()
    }

    #[test]
    fn zero_difficulty_always_meets_target() {
        assert!(meets_target(&template(0)));
    }

    #[test]
    fn mine_finds_a_nonce_for_low_difficulty() {
        let (mined, tries) = mine(template(4), 10_000).expect("should find a nonce within budget");
        assert!(meets_target(&mined));
        assert!(tries >= 1);
    }

    #[test]
    fn mine_gives_up_after_max_tries_for_unreasonable_difficulty() {
        // 60 leading zero bits is not findable within a handful of tries.
        let result = mine(template(60), 8);
        assert!(result.is_none());
    }

    #[test]
    fn block_work_doubles_per_bit() {
        assert_eq!(block_work(0), Work::one());
        assert!(block_work(1) > block_work(0));
        assert!(block_work(24) > block_work(8));
    }
}
