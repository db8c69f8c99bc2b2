//! `Node`: the façade wiring mempool, state, chain store, and the producer
//! into the single object a bootstrap driver or collaborator embeds.
//!
//! Spec.md §6 asks for `start()` / `tick()` / `close()` plus accessors
//! returning the three stores; the teacher has no equivalent type (its
//! `main.rs` wires a `ConsensusEngine` and a `TxPool` inline), so this is
//! this spec's own generalization of that inline-wiring pattern into a
//! reusable struct.

use std::path::Path;
use std::sync::Arc;

use crate::config::ChainConfig;
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::producer::{self, ProducerError};
use crate::replay::{self, ReplayError};
use crate::state::StateStore;
use crate::storage::ChainStore;
use crate::types::BlockHash;

/// Composes the three internally-synchronized stores plus the producer,
/// behind the order the concurrency model of spec.md §5 requires
/// (mempool, then state, then chain).
pub struct Node {
    mempool: Mempool,
    state: StateStore,
    chain: Arc<dyn ChainStore>,
    config: ChainConfig,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Node {
    /// Builds a `Node` over an already-open chain store. Does not run
    /// genesis/replay; call [`Node::start`] before ticking.
    pub fn new(chain: Arc<dyn ChainStore>, config: ChainConfig) -> Self {
        Self {
            mempool: Mempool::new(config.consensus.min_fee),
            state: StateStore::new(),
            chain,
            config,
            metrics: None,
        }
    }

    /// Attaches a metrics registry; `tick` records into it when present.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs genesis mint or chain replay (spec.md §4.10), loading
    /// allocations from `self.config.genesis.allocations_path` if present,
    /// or seeding an empty allocation table otherwise. Fatal on failure per
    /// spec.md §7 ("startup replay failures are fatal").
    pub fn start(&self, now_ms: i64) -> Result<Vec<replay::TopUp>, ReplayError> {
        let path = Path::new(&self.config.genesis.allocations_path);
        let allocations = if path.exists() {
            replay::load_allocations(path)?
        } else {
            tracing::warn!(
                path = %self.config.genesis.allocations_path,
                "genesis allocation file absent, seeding with defaults"
            );
            Default::default()
        };

        let top_ups = replay::bootstrap(&self.state, self.chain.as_ref(), &allocations, now_ms)?;
        if let Some(metrics) = &self.metrics {
            metrics
                .chain
                .chain_height
                .set(self.chain.get_height(&self.chain.get_head().expect("bootstrap leaves a head")).unwrap_or(0) as f64);
        }
        Ok(top_ups)
    }

    /// Runs one producer attempt (spec.md §4.9), recording `tick_seconds`,
    /// `pow_attempts`, `mempool_size`, `chain_height`, and
    /// `blocks_rejected_total` on the attached metrics registry, if any.
    pub fn tick(&self, now_ms: i64) -> Result<Option<BlockHash>, ProducerError> {
        let start = std::time::Instant::now();
        let mut pow_attempts = 0u64;
        let result = producer::tick(
            &self.mempool,
            &self.state,
            self.chain.as_ref(),
            &self.config.consensus,
            now_ms,
            &mut pow_attempts,
        );

        if let Some(metrics) = &self.metrics {
            metrics.chain.tick_seconds.observe(start.elapsed().as_secs_f64());
            if pow_attempts > 0 {
                metrics.chain.pow_attempts.observe(pow_attempts as f64);
            }
            metrics.chain.mempool_size.set(self.mempool.size() as f64);
            if let Some(head) = self.chain.get_head() {
                if let Some(height) = self.chain.get_height(&head) {
                    metrics.chain.chain_height.set(height as f64);
                }
            }
            if let Err(ProducerError::Consensus(e)) = &result {
                metrics.chain.record_rejection(e);
            }
        }

        result
    }

    /// No background resources to release today (no network listeners, no
    /// spawned threads owned by `Node` itself); kept so bootstrap code has
    /// a stable shutdown hook regardless of how the stores evolve.
    pub fn close(&self) {
        tracing::info!("node closing");
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn chain(&self) -> &dyn ChainStore {
        self.chain.as_ref()
    }
}
