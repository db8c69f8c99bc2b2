// src/main.rs
//
// Minimal demo node that wires up the chain library:
//
// - RocksDB-backed storage
// - genesis mint / replay on startup
// - Prometheus metrics exporter on /metrics
// - a fixed-interval tick loop driving the block producer.

use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use chain::{ChainConfig, MetricsRegistry, Node, RocksDbChainStore, run_prometheus_http_server};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run_node().await {
        error!(%err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = ChainConfig::default();

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                error!(error = %e, "metrics HTTP server error");
            }
        });
        info!(%addr, "metrics exporter listening on /metrics");
    }

    let store = RocksDbChainStore::open(&cfg.storage).map_err(|e| {
        format!("failed to open RocksDB store at {}: {e}", cfg.storage.path)
    })?;

    let node = Node::new(Arc::new(store), cfg.clone()).with_metrics(metrics);

    let now_ms = current_unix_millis();
    let top_ups = node
        .start(now_ms)
        .map_err(|e| format!("startup replay failed: {e}"))?;
    if !top_ups.is_empty() {
        warn!(count = top_ups.len(), "replay recorded top-up events");
    }
    info!(
        height = node.chain().get_height(&node.chain().get_head().expect("start leaves a head")).unwrap_or(0),
        "node started"
    );

    loop {
        let now_ms = current_unix_millis();
        match node.tick(now_ms) {
            Ok(Some(hash)) => info!(%hash, "tick produced a block"),
            Ok(None) => {}
            Err(e) => error!(error = %e, "tick failed"),
        }
        tokio::time::sleep(TICK_INTERVAL).await;
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch. Falls
/// back to 0 if the system clock is set before the epoch.
fn current_unix_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
