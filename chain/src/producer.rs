//! Block producer: one mine-validate-apply-persist attempt per `tick`.
//!
//! See spec.md §4.9. `tick` is the sole writer of committed state and of the
//! chain store in the single-node case; every failure path rolls back
//! whatever prefix of state/reward/mempool-drain it had already applied.

use crate::consensus::{self, ConsensusConfig, ConsensusError};
use crate::mempool::Mempool;
use crate::pow;
use crate::state::{StateError, StateStore};
use crate::storage::{ChainStore, StorageError};
use crate::types::block::{BlockError, BlockHash, BlockHeader};
use crate::types::Hash256;

/// Failure surfaced by [`tick`]. Every variant implies the producer has
/// already rolled back any partial state/reward/mempool change.
#[derive(Debug)]
pub enum ProducerError {
    Consensus(ConsensusError),
    State(StateError),
    Storage(StorageError),
    Block(BlockError),
}

impl std::fmt::Display for ProducerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerError::Consensus(e) => write!(f, "consensus rejected mined block: {e}"),
            ProducerError::State(e) => write!(f, "state error during tick: {e}"),
            ProducerError::Storage(e) => write!(f, "storage error during tick: {e}"),
            ProducerError::Block(e) => write!(f, "block assembly error during tick: {e}"),
        }
    }
}

impl std::error::Error for ProducerError {}

impl From<ConsensusError> for ProducerError {
    fn from(e: ConsensusError) -> Self {
        ProducerError::Consensus(e)
    }
}

impl From<StateError> for ProducerError {
    fn from(e: StateError) -> Self {
        ProducerError::State(e)
    }
}

impl From<StorageError> for ProducerError {
    fn from(e: StorageError) -> Self {
        ProducerError::Storage(e)
    }
}

impl From<BlockError> for ProducerError {
    fn from(e: BlockError) -> Self {
        ProducerError::Block(e)
    }
}

/// Runs one production attempt against `mempool`/`state`/`chain`, per
/// spec.md §4.9. Returns the new head hash on success, `None` if there was
/// nothing to do (no pending txs past genesis, or PoW exhausted its
/// budget), or `Err` if consensus/state/storage rejected the attempt: in
/// the `Err` case, `state`, `mempool`, and `chain` are left exactly as they
/// were before the call.
///
/// `pow_attempts` is set to the number of nonce iterations the PoW search
/// took on a successful mine, or left at `0` when `difficulty_bits <= 0`
/// (no search is performed) or when the call returns early. Callers that
/// don't care about the metric can pass a throwaway `u64`.
pub fn tick(
    mempool: &Mempool,
    state: &StateStore,
    chain: &dyn ChainStore,
    config: &ConsensusConfig,
    now_ms: i64,
    pow_attempts: &mut u64,
) -> Result<Option<BlockHash>, ProducerError> {
    let parent = chain.get_head();
    let parent_height: i64 = match parent {
        Some(hash) => chain
            .get_height(&hash)
            .expect("head's height must be recorded") as i64,
        None => -1,
    };
    let height = (parent_height + 1) as u64;

    let txs = mempool.get_batch(config.max_tx_per_block);
    if txs.is_empty() && height > 0 {
        tracing::debug!(height, "tick: nothing to do, mempool empty past genesis");
        return Ok(None);
    }

    let mut total_fees: i64 = 0;
    for tx in &txs {
        total_fees = match total_fees.checked_add(tx.fee_minor) {
            Some(sum) => sum,
            None => {
                mempool.requeue(txs);
                return Err(ProducerError::State(StateError::Overflow));
            }
        };
    }
    let reward = if config.miner_address.is_some() {
        match config.block_reward_minor.checked_add(total_fees) {
            Some(sum) => sum,
            None => {
                mempool.requeue(txs);
                return Err(ProducerError::State(StateError::Overflow));
            }
        }
    } else {
        0
    };

    let parent_hash = parent.unwrap_or(BlockHash(Hash256::ZERO));
    let header = BlockHeader {
        parent_hash,
        merkle_root: Hash256::ZERO,
        height,
        timestamp_ms: now_ms,
        difficulty_bits: config.difficulty_bits,
        nonce: 0,
    };
    let template = match crate::types::Block::new(header, txs.clone()) {
        Ok(block) => block,
        Err(e) => {
            mempool.requeue(txs);
            return Err(ProducerError::Block(e));
        }
    };

    let final_block = if config.difficulty_bits > 0 {
        match pow::mine(template, config.max_pow_tries) {
            Some((block, tries)) => {
                *pow_attempts = tries;
                block
            }
            None => {
                tracing::debug!(height, "tick: PoW search exhausted its budget");
                mempool.requeue(txs);
                return Ok(None);
            }
        }
    } else {
        template
    };

    if let Err(e) = consensus::validate_block(&final_block, chain, now_ms) {
        mempool.requeue(txs);
        return Err(ProducerError::Consensus(e));
    }

    if let Err(e) = state.apply_block(&final_block) {
        mempool.requeue(txs);
        return Err(ProducerError::State(e));
    }

    if reward > 0 {
        let miner = config
            .miner_address
            .as_ref()
            .expect("reward > 0 implies miner_address is set");
        if let Err(e) = state.credit(miner, reward) {
            state
                .revert_block(&final_block)
                .expect("revert_block must undo a just-applied block");
            mempool.requeue(txs);
            return Err(ProducerError::State(e));
        }
    }

    match chain.put_block(final_block.clone()) {
        Ok(hash) => {
            tracing::info!(height, hash = %hash, tx_count = final_block.txs.len(), "tick produced a block");
            Ok(Some(hash))
        }
        Err(e) => {
            if reward > 0 {
                let miner = config
                    .miner_address
                    .as_ref()
                    .expect("reward > 0 implies miner_address is set");
                state
                    .credit(miner, -reward)
                    .expect("reverting a reward credit must not overflow");
            }
            state
                .revert_block(&final_block)
                .expect("revert_block must undo a just-applied block");
            mempool.requeue(txs);
            Err(ProducerError::Storage(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryChainStore;
    use crate::types::tx::{TransactionFields, TX_VERSION};
    use crate::types::{Address, Transaction};

    fn tx(from: &str, to: &str, amount: i64, fee: i64, nonce: u64) -> Transaction {
        Transaction::build(TransactionFields {
            version: TX_VERSION,
            chain_id: 1,
            from: Address::from(from),
            to: Address::from(to),
            amount_minor: amount,
            fee_minor: fee,
            nonce,
            timestamp_ms: 1_700_000_000_000,
            payload: vec![],
            signature: vec![1u8; 64],
            public_key: None,
        })
        .unwrap()
    }

    fn config() -> ConsensusConfig {
        ConsensusConfig {
            difficulty_bits: 0,
            max_tx_per_block: 100,
            max_pow_tries: 1_000,
            min_fee: 0,
            block_reward_minor: 50,
            miner_address: None,
        }
    }

    #[test]
    fn empty_mempool_past_genesis_returns_none() {
        let mempool = Mempool::new(0);
        let state = StateStore::new();
        let chain = InMemoryChainStore::new();
        let genesis =
            crate::replay::build_genesis_block(1_700_000_000_000);
        chain.put_block(genesis).unwrap();

        let mut pow_attempts = 0u64;
        let result = tick(&mempool, &state, &chain, &config(), 1_700_000_001_000, &mut pow_attempts).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn tick_mints_genesis_with_empty_mempool() {
        let mempool = Mempool::new(0);
        let state = StateStore::new();
        let chain = InMemoryChainStore::new();

        let mut pow_attempts = 0u64;
        let result = tick(&mempool, &state, &chain, &config(), 1_700_000_000_000, &mut pow_attempts).unwrap();
        assert!(result.is_some());
        assert_eq!(chain.size(), 1);
    }

    #[test]
    fn tick_applies_transfer_and_credits_reward() {
        let mempool = Mempool::new(0);
        let state = StateStore::new();
        let chain = InMemoryChainStore::new();
        let alice = Address::from("alice0001");
        let bob = Address::from("bob00001");
        state.set_balance(&alice, 1_000_000);

        let mut pow_attempts = 0u64;
        tick(&mempool, &state, &chain, &config(), 1_700_000_000_000, &mut pow_attempts).unwrap();

        mempool
            .add(tx("alice0001", "bob00001", 100, 1, 0), &state)
            .unwrap();

        let mut cfg = config();
        cfg.miner_address = Some(alice.clone());

        let result = tick(&mempool, &state, &chain, &cfg, 1_700_000_001_000, &mut pow_attempts).unwrap();
        assert!(result.is_some());

        assert_eq!(state.get_balance(&bob), 100);
        assert_eq!(state.get_balance(&alice), 1_000_000 - 101 + 51);
        assert_eq!(state.get_nonce(&alice), 1);
        assert_eq!(mempool.size(), 0);
    }

    #[test]
    fn tick_rejects_timestamp_not_after_parent_and_rolls_back() {
        let mempool = Mempool::new(0);
        let state = StateStore::new();
        let chain = InMemoryChainStore::new();
        let alice = Address::from("alice0001");
        state.set_balance(&alice, 1_000);

        let genesis = crate::replay::build_genesis_block(1_700_000_000_000);
        chain.put_block(genesis).unwrap();

        mempool
            .add(tx("alice0001", "bob00001", 10, 1, 0), &state)
            .unwrap();

        // A tick timestamped at or before the parent's is rejected by
        // consensus; nothing the producer already applied survives.
        let mut pow_attempts = 0u64;
        let result = tick(&mempool, &state, &chain, &config(), 1_700_000_000_000, &mut pow_attempts);
        assert!(matches!(result, Err(ProducerError::Consensus(_))));

        assert_eq!(state.get_balance(&alice), 1_000);
        assert_eq!(state.get_nonce(&alice), 0);
        assert_eq!(mempool.size(), 1);
        assert_eq!(chain.size(), 1);
    }

    struct FailOnceChainStore {
        inner: InMemoryChainStore,
        failed: std::sync::atomic::AtomicBool,
    }

    impl FailOnceChainStore {
        fn new() -> Self {
            Self {
                inner: InMemoryChainStore::new(),
                failed: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl ChainStore for FailOnceChainStore {
        fn put_block(&self, block: crate::types::Block) -> Result<BlockHash, StorageError> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(StorageError::BackendFailure("injected failure".into()));
            }
            self.inner.put_block(block)
        }

        fn get_block(&self, hash: &BlockHash) -> Option<crate::types::Block> {
            self.inner.get_block(hash)
        }

        fn get_head(&self) -> Option<BlockHash> {
            self.inner.get_head()
        }

        fn set_head(&self, hash: BlockHash) -> Result<(), StorageError> {
            self.inner.set_head(hash)
        }

        fn get_height(&self, hash: &BlockHash) -> Option<u64> {
            self.inner.get_height(hash)
        }

        fn get_total_work(&self, hash: &BlockHash) -> Option<crate::work::Work> {
            self.inner.get_total_work(hash)
        }

        fn get_children(&self, parent_hash: &BlockHash) -> Vec<BlockHash> {
            self.inner.get_children(parent_hash)
        }

        fn size(&self) -> usize {
            self.inner.size()
        }

        fn blocks_in_order(&self) -> Vec<crate::types::Block> {
            self.inner.blocks_in_order()
        }
    }

    #[test]
    fn persistence_failure_rolls_back_state_and_mempool() {
        let mempool = Mempool::new(0);
        let state = StateStore::new();
        let chain = FailOnceChainStore::new();
        let alice = Address::from("alice0001");
        let bob = Address::from("bob00001");
        let miner = Address::from("miner001");
        state.set_balance(&alice, 100);

        mempool
            .add(tx("alice0001", "bob00001", 10, 1, 0), &state)
            .unwrap();

        let mut cfg = config();
        cfg.miner_address = Some(miner.clone());

        let mut pow_attempts = 0u64;
        let result = tick(&mempool, &state, &chain, &cfg, 1_700_000_000_000, &mut pow_attempts);
        assert!(matches!(result, Err(ProducerError::Storage(_))));

        assert_eq!(state.get_balance(&alice), 100);
        assert_eq!(state.get_balance(&bob), 0);
        assert_eq!(state.get_balance(&miner), 0);
        assert_eq!(state.get_nonce(&alice), 0);
        assert_eq!(mempool.size(), 1);
    }
}
