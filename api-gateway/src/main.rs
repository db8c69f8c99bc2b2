// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `POST /tx`
//! - `GET /chain/head`
//!
//! It embeds a RocksDB-backed `Node`, runs genesis mint / replay on
//! startup, drives the block producer on a fixed-interval tick loop, and
//! exposes a Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use chain::{ChainConfig, MetricsRegistry, Node, RocksDbChainStore, run_prometheus_http_server};
use config::ApiConfig;
use routes::{health, tx};
use state::{AppState, SharedState};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let chain_cfg = ChainConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + node
    // ---------------------------

    let store = RocksDbChainStore::open(&chain_cfg.storage).map_err(|e| {
        format!(
            "failed to open RocksDB store at {}: {e}",
            chain_cfg.storage.path
        )
    })?;

    let node = Node::new(Arc::new(store), chain_cfg.clone()).with_metrics(metrics.clone());

    let top_ups = node
        .start(current_unix_millis())
        .map_err(|e| format!("startup replay failed: {e}"))?;
    if !top_ups.is_empty() {
        tracing::warn!(count = top_ups.len(), "replay recorded top-up events");
    }

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState { node });

    // ---------------------------
    // Block producer loop
    // ---------------------------

    let producer_state = app_state.clone();
    tokio::spawn(async move {
        run_block_producer(producer_state).await;
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/tx", post(tx::submit_tx))
        .route("/chain/head", get(tx::chain_head))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    app_state.node.close();
    Ok(())
}

/// Background block producer loop. Periodically asks the embedded `Node`
/// to attempt one `tick`, draining the mempool and extending the chain.
async fn run_block_producer(state: SharedState) {
    tracing::info!(
        "block producer running with interval {}s",
        TICK_INTERVAL.as_secs()
    );

    loop {
        let now_ms = current_unix_millis();
        match state.node.tick(now_ms) {
            Ok(Some(hash)) => tracing::info!(%hash, "tick produced a block"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "tick failed"),
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

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
