//! `POST /admin/mode` (§6): switch between proxy and mock run modes.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use learnproxy_core::{Engine, RunMode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AdminError;

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

async fn set_mode(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SetModeRequest>,
) -> Result<Json<Value>, AdminError> {
    let mode: RunMode = request
        .mode
        .parse()
        .map_err(|_| AdminError::bad_request("INVALID_MODE", format!("unknown mode: {}", request.mode)))?;
    engine.set_mode(mode);
    Ok(Json(json!({ "mode": mode.to_string() })))
}

/// Router for `POST /admin/mode`.
pub fn router() -> Router<Arc<Engine>> {
    Router::new().route("/", post(set_mode))
}
