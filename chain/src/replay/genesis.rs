//! Genesis allocation I/O and chain replay.
//!
//! spec.md §6 pins down the on-disk format of `genesis-alloc.json` (a UTF-8
//! JSON object mapping address string -> non-negative integer minor units)
//! but leaves the read/write code itself unspecified; this module supplies
//! it, following the `serde_json` conventions already used elsewhere in the
//! crate for canonical-ish, human-editable documents.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::state::{StateError, StateStore};
use crate::storage::{ChainStore, StorageError};
use crate::types::block::{BlockHash, BlockHeader, Merkle};
use crate::types::{Address, Block, Hash256};

/// Failure surfaced by genesis I/O or chain replay.
#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    Json(serde_json::Error),
    State(StateError),
    Storage(StorageError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "I/O error: {e}"),
            ReplayError::Json(e) => write!(f, "JSON error: {e}"),
            ReplayError::State(e) => write!(f, "state error during replay: {e}"),
            ReplayError::Storage(e) => write!(f, "storage error during replay: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        ReplayError::Json(e)
    }
}

impl From<StateError> for ReplayError {
    fn from(e: StateError) -> Self {
        ReplayError::State(e)
    }
}

impl From<StorageError> for ReplayError {
    fn from(e: StorageError) -> Self {
        ReplayError::Storage(e)
    }
}

/// A deficit covered during replay because the in-memory balance that
/// produced a persisted transaction no longer exists (state itself is
/// never persisted, only the chain that produced it).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TopUp {
    pub address: Address,
    pub amount_minor: i64,
}

/// Reads `path` as a `genesis-alloc.json` document: a JSON object mapping
/// address string to non-negative integer minor units. Unknown fields
/// cannot occur (the format has no nested structure), but extra top-level
/// keys with non-integer values are rejected by `serde_json` itself.
pub fn load_allocations(path: &Path) -> Result<HashMap<String, i64>, ReplayError> {
    let bytes = std::fs::read(path)?;
    let map: HashMap<String, i64> = serde_json::from_slice(&bytes)?;
    Ok(map)
}

/// Writes `allocations` to `path` as pretty-printed JSON, per spec.md §6
/// ("writes are pretty-printed").
pub fn write_default_allocations(
    path: &Path,
    allocations: &HashMap<String, i64>,
) -> Result<(), ReplayError> {
    let text = serde_json::to_string_pretty(allocations)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}

/// Builds the genesis block: height 0, all-zero parent, empty transaction
/// list (so `merkle_root` is the all-zero Merkle root), difficulty 0,
/// nonce 0, at `timestamp_ms`.
pub fn build_genesis_block(timestamp_ms: i64) -> Block {
    let header = BlockHeader {
        parent_hash: BlockHash(Hash256::ZERO),
        merkle_root: Merkle::root(&[]),
        height: 0,
        timestamp_ms,
        difficulty_bits: 0,
        nonce: 0,
    };
    Block::new(header, vec![]).expect("empty genesis block is always within the tx cap")
}

/// Seeds `state` from `allocations`: balances are set absolutely, nonces
/// are reset to 0. Used both for a fresh genesis mint and as the first step
/// of replaying an existing chain.
fn seed_allocations(state: &StateStore, allocations: &HashMap<String, i64>) {
    for (addr, amount) in allocations {
        let address = Address::from(addr.as_str());
        state.set_balance(&address, *amount);
        state.set_nonce(&address, 0);
    }
}

/// Startup entry point (spec.md §4.10): if `chain` is empty, mints and
/// persists a genesis block and seeds `state` from `allocations`. Otherwise
/// seeds `state` from `allocations` and replays every persisted block's
/// transactions in order, crediting any deficit encountered (state is
/// derived, never persisted, so a deficit here just means the allocation
/// table or an earlier top-up produced the missing funds) and recording it
/// as a [`TopUp`] event.
pub fn bootstrap(
    state: &StateStore,
    chain: &dyn ChainStore,
    allocations: &HashMap<String, i64>,
    now_ms: i64,
) -> Result<Vec<TopUp>, ReplayError> {
    if chain.size() == 0 {
        let genesis = build_genesis_block(now_ms);
        chain.put_block(genesis)?;
        seed_allocations(state, allocations);
        tracing::info!(allocations = allocations.len(), "minted genesis block");
        return Ok(Vec::new());
    }

    seed_allocations(state, allocations);

    let mut top_ups = Vec::new();
    for block in chain.blocks_in_order() {
        for tx in &block.txs {
            let required = tx
                .amount_minor
                .checked_add(tx.fee_minor)
                .ok_or(StateError::Overflow)?;
            let available = state.get_balance(&tx.from);
            if available < required {
                let deficit = required - available;
                state.credit(&tx.from, deficit)?;
                top_ups.push(TopUp {
                    address: tx.from.clone(),
                    amount_minor: deficit,
                });
            }
            state.apply_tx(tx)?;
        }
    }

    tracing::info!(
        blocks = chain.size(),
        top_ups = top_ups.len(),
        "replayed persisted chain into state"
    );
    Ok(top_ups)
}
