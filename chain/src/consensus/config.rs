//! Consensus configuration (spec.md §6): the only knobs the core consumes.

use crate::types::Address;

/// Tunable parameters for mining and block admission.
///
/// Per spec.md §6, the core consumes exactly these fields; everything else
/// (data directory, CLI flags, P2P settings, ...) is a bootstrap concern.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Required leading-zero bits in a header's hash, per spec.md §4.6.
    pub difficulty_bits: u32,
    /// Maximum number of transactions the producer drains per tick.
    pub max_tx_per_block: usize,
    /// Nonce search budget per tick before `mine` gives up.
    pub max_pow_tries: u64,
    /// Minimum fee a transaction must carry to be admitted to the mempool.
    pub min_fee: i64,
    /// Flat block reward, in minor units, credited to `miner_address` on
    /// top of collected fees.
    pub block_reward_minor: i64,
    /// Address credited with `block_reward_minor + total_fees` for each
    /// produced block. `None` means no reward is credited.
    pub miner_address: Option<Address>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            difficulty_bits: 8,
            max_tx_per_block: 10_000,
            max_pow_tries: 2_000_000,
            min_fee: 0,
            block_reward_minor: 50,
            miner_address: None,
        }
    }
}
