//! Admin API handlers, one module per concern (§6), each exposing its own
//! `router() -> Router<Arc<Engine>>`.

pub mod chaos;
pub mod drift;
pub mod endpoints;
pub mod health;
pub mod mode;
pub mod stream;

use std::sync::Arc;

use axum::Router;
use learnproxy_core::Engine;

/// Compose every `/admin` sub-router under its path.
pub fn admin_router() -> Router<Arc<Engine>> {
    Router::new()
        .nest("/endpoints", endpoints::router())
        .nest("/mode", mode::router())
        .nest("/chaos", chaos::router())
        .nest("/drift-alerts", drift::router())
        .nest("/health", health::router())
        .nest("/stream", stream::router())
}
