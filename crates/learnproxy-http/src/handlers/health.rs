//! `/admin/health` (§6): per-endpoint and global health scores.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use learnproxy_core::Engine;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AdminError;

#[derive(Debug, Serialize)]
pub struct EndpointHealthEntry {
    pub endpoint_key: String,
    pub score: f64,
}

async fn all_health(State(engine): State<Arc<Engine>>) -> Json<Value> {
    let mut scores: Vec<EndpointHealthEntry> = engine
        .health
        .all_scores()
        .into_iter()
        .map(|(endpoint_key, score)| EndpointHealthEntry { endpoint_key, score })
        .collect();
    scores.sort_by(|a, b| a.endpoint_key.cmp(&b.endpoint_key));
    Json(json!({ "endpoints": scores, "global": engine.health.global_score() }))
}

async fn global_health(State(engine): State<Arc<Engine>>) -> Json<Value> {
    Json(json!({ "global": engine.health.global_score() }))
}

async fn endpoint_health(
    State(engine): State<Arc<Engine>>,
    Path(endpoint_id): Path<String>,
) -> Result<Json<Value>, AdminError> {
    let score = engine
        .health
        .score(&endpoint_id)
        .ok_or_else(|| AdminError::not_found("ENDPOINT_NOT_FOUND", format!("no such endpoint: {endpoint_id}")))?;
    Ok(Json(json!({ "endpoint_key": endpoint_id, "score": score })))
}

/// Router for `GET /admin/health`, `GET /admin/health/global`, and
/// `GET /admin/health/{endpoint_id}`.
pub fn router() -> Router<Arc<Engine>> {
    Router::new()
        .route("/", get(all_health))
        .route("/global", get(global_health))
        .route("/{*endpoint_id}", get(endpoint_health))
}
