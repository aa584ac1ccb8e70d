//! HTTP transport for learnproxy: the `/admin` management surface plus the
//! catch-all proxy/mock surface, both built on top of a shared
//! [`learnproxy_core::Engine`] (§6).

pub mod error;
pub mod handlers;
pub mod proxy;

use std::sync::Arc;

use axum::Router;
use learnproxy_core::Engine;

/// Build the full application router: every `/admin` route plus the
/// catch-all fallback that proxies or mocks everything else.
pub fn build_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .nest("/admin", handlers::admin_router())
        .fallback(proxy::proxy_handler)
        .with_state(engine)
}
