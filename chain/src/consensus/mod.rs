//! Consensus rules: block-shape validation against the chain store.
//!
//! See spec.md §4.7. `validate_block` is pure with respect to its inputs:
//! it reads the chain store but never mutates it, so the producer can call
//! it before deciding whether to commit.

pub mod config;
pub mod error;
pub mod rules;

pub use config::ConsensusConfig;
pub use error::ConsensusError;
pub use rules::validate_block;
