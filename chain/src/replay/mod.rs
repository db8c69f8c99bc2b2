//! State replayer and genesis bootstrap (spec.md §4.10).
//!
//! On startup the node either mints a genesis block (empty chain store) or
//! replays every persisted block's transactions, in order, to rebuild the
//! in-memory [`crate::state::StateStore`]: the chain is the source of
//! truth, balances are derived.

pub mod genesis;

pub use genesis::{
    ReplayError, TopUp, bootstrap, build_genesis_block, load_allocations,
    write_default_allocations,
};
