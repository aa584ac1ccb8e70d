//! `/admin/endpoints` (§6): list and per-endpoint detail views over the
//! Behavior Store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use learnproxy_core::{Engine, EndpointBehavior};
use serde::Serialize;
use serde_json::Value;

use crate::error::AdminError;

/// Split the composite `"METHOD pattern_key"` endpoint key back into its two
/// parts for presentation; the Dispatch Core never needs this split, only
/// admin API consumers do.
fn split_endpoint_key(endpoint_key: &str) -> (String, String) {
    match endpoint_key.split_once(' ') {
        Some((method, pattern_key)) => (method.to_string(), pattern_key.to_string()),
        None => (String::new(), endpoint_key.to_string()),
    }
}

/// A condensed view of one endpoint's behavior, returned by the list route.
#[derive(Debug, Serialize)]
pub struct EndpointSummary {
    pub endpoint_key: String,
    pub method: String,
    pub pattern_key: String,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub sample_count: u64,
    pub latency_mean_ms: f64,
    pub latency_stddev_ms: f64,
    pub health_score: f64,
}

impl EndpointSummary {
    fn from_behavior(behavior: &EndpointBehavior, health_score: f64) -> Self {
        let (method, pattern_key) = split_endpoint_key(&behavior.endpoint_key);
        Self {
            endpoint_key: behavior.endpoint_key.clone(),
            method,
            pattern_key,
            first_seen_ms: behavior.first_seen_ms,
            last_seen_ms: behavior.last_seen_ms,
            sample_count: behavior.sample_count,
            latency_mean_ms: behavior.latency_mean_ms,
            latency_stddev_ms: behavior.latency_stddev_ms(),
            health_score,
        }
    }
}

/// The full record for one endpoint: its behavior plus the live health
/// score and whether it currently has an active drift alert.
#[derive(Debug, Serialize)]
pub struct EndpointDetail {
    #[serde(flatten)]
    pub behavior: EndpointBehavior,
    pub health_score: f64,
    pub has_active_drift: bool,
}

async fn list_endpoints(State(engine): State<Arc<Engine>>) -> Json<Value> {
    let mut summaries: Vec<EndpointSummary> = engine
        .behavior
        .endpoint_keys()
        .into_iter()
        .filter_map(|key| {
            let behavior = engine.behavior.get(&key)?;
            let score = engine.health.score(&key).unwrap_or(100.0);
            Some(EndpointSummary::from_behavior(&behavior, score))
        })
        .collect();
    summaries.sort_by(|a, b| a.endpoint_key.cmp(&b.endpoint_key));
    Json(serde_json::json!({ "endpoints": summaries }))
}

async fn get_endpoint(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> Result<Json<EndpointDetail>, AdminError> {
    let behavior = engine
        .behavior
        .get(&id)
        .ok_or_else(|| AdminError::not_found("ENDPOINT_NOT_FOUND", format!("no such endpoint: {id}")))?;
    let health_score = engine.health.score(&id).unwrap_or(100.0);
    let has_active_drift = engine.drift.read().has_active(&id);
    Ok(Json(EndpointDetail { behavior, health_score, has_active_drift }))
}

/// Router for `GET /admin/endpoints` and `GET /admin/endpoints/{*id}`.
pub fn router() -> Router<Arc<Engine>> {
    Router::new()
        .route("/", get(list_endpoints))
        .route("/{*id}", get(get_endpoint))
}
