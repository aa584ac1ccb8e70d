//! Catch-all proxy/mock surface (§6): any method, any path not under
//! `/admin`, converted to an [`InboundRequest`] and handed to the Dispatch
//! Core.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use learnproxy_core::{Engine, InboundRequest};

fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect()
}

/// Forward every request not matched by `/admin` into the Dispatch Core.
pub async fn proxy_handler(
    State(engine): State<Arc<Engine>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    };

    let request = InboundRequest {
        method: method.as_str().to_string(),
        path,
        headers: headers_to_pairs(&headers),
        body: body.to_vec(),
    };

    let outbound = engine.handle_request(request).await;

    let mut builder = Response::builder().status(outbound.status);
    for (name, value) in &outbound.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(axum::body::Body::from(outbound.body))
        .unwrap_or_else(|_| Response::new(axum::body::Body::empty()))
}
