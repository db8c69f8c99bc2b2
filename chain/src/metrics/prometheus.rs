//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::consensus::ConsensusError;

/// Node-level Prometheus metrics: one per tick/mempool/chain observable
/// named in SPEC_FULL.md §3.4.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Wall-clock time spent in a single `tick`, in seconds.
    pub tick_seconds: Histogram,
    /// Number of nonce iterations `PoW::mine` spent per successful tick.
    pub pow_attempts: Histogram,
    /// Current number of transactions pending in the mempool.
    pub mempool_size: Gauge,
    /// Height of the current chain head.
    pub chain_height: Gauge,
    /// Blocks rejected by consensus validation, keyed by the
    /// [`ConsensusError`] variant name.
    pub blocks_rejected_total: IntCounterVec,
}

impl ChainMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let tick_seconds = Histogram::with_opts(
            HistogramOpts::new("tick_seconds", "Time spent in a single producer tick, in seconds")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
        )?;
        registry.register(Box::new(tick_seconds.clone()))?;

        let pow_attempts = Histogram::with_opts(
            HistogramOpts::new("pow_attempts", "Nonce iterations spent per successful tick")
                .buckets(vec![
                    1.0, 10.0, 100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0,
                ]),
        )?;
        registry.register(Box::new(pow_attempts.clone()))?;

        let mempool_size = Gauge::with_opts(Opts::new(
            "mempool_size",
            "Number of transactions currently pending in the mempool",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let chain_height = Gauge::with_opts(Opts::new(
            "chain_height",
            "Height of the current chain head",
        ))?;
        registry.register(Box::new(chain_height.clone()))?;

        let blocks_rejected_total = IntCounterVec::new(
            Opts::new(
                "blocks_rejected_total",
                "Blocks rejected by consensus validation, keyed by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        Ok(Self {
            tick_seconds,
            pow_attempts,
            mempool_size,
            chain_height,
            blocks_rejected_total,
        })
    }

    /// Increments `blocks_rejected_total` with a label derived from the
    /// `ConsensusError` variant that caused the rejection.
    pub fn record_rejection(&self, err: &ConsensusError) {
        let reason = match err {
            ConsensusError::UnknownParent => "unknown_parent",
            ConsensusError::BadHeight { .. } => "bad_height",
            ConsensusError::MerkleMismatch => "merkle_mismatch",
            ConsensusError::BadProofOfWork => "bad_proof_of_work",
            ConsensusError::TimestampOutOfRange => "timestamp_out_of_range",
            ConsensusError::Storage(_) => "storage",
        };
        self.blocks_rejected_total.with_label_values(&[reason]).inc();
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
///
/// This is the main handle passed around the node; wrap it in an [`Arc`]
/// and share it across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the node metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
