//! Shared application state.

use std::sync::Arc;

use chain::Node;

/// Shared state held by the API and the background tick loop.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor. `Node` is internally synchronized (mempool, state,
/// and chain store each hold their own mutex), so no extra locking is
/// needed here.
pub struct AppState {
    pub node: Node,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
