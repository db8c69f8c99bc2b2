//! Chain library crate.
//!
//! This crate provides the core building blocks for a minimal
//! account-based proof-of-work blockchain node:
//!
//! - a deterministic, length-prefixed canonical codec (`codec`),
//! - strongly-typed domain types: hashes, addresses, transactions, blocks
//!   (`types`),
//! - cumulative proof-of-work (`work`, `pow`),
//! - an in-memory account balance/nonce store (`state`),
//! - a stateful transaction mempool (`mempool`),
//! - block-shape consensus rules (`consensus`),
//! - a fork-aware, pluggable chain store (`storage`),
//! - the block producer `tick` (`producer`),
//! - genesis bootstrap and chain replay (`replay`),
//! - Prometheus-based metrics (`metrics`),
//! - top-level node configuration (`config`),
//! - and the `Node` façade composing all of the above (`node`).
//!
//! Higher-level binaries (`main.rs`, `api-gateway`) compose these pieces
//! into a running node.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod mempool;
pub mod metrics;
pub mod node;
pub mod pow;
pub mod producer;
pub mod replay;
pub mod state;
pub mod storage;
pub mod types;
pub mod work;

pub use config::{ChainConfig, GenesisConfig, MetricsConfig};
pub use consensus::{ConsensusConfig, ConsensusError};
pub use mempool::{AdmissionError, Mempool};
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};
pub use node::Node;
pub use producer::ProducerError;
pub use replay::{ReplayError, TopUp};
pub use state::{StateError, StateStore};
pub use storage::{ChainStore, InMemoryChainStore, RocksDbChainStore, RocksDbConfig, StorageError};
pub use work::Work;

// Re-export domain types at the crate root for convenience.
pub use types::*;
