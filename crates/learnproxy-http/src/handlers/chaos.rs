//! `GET|POST /admin/chaos` (§6): read or update the global chaos profile
//! and its per-endpoint overrides.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use learnproxy_core::{ChaosProfile, Engine};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChaosView {
    pub global: ChaosProfile,
    pub endpoints: HashMap<String, ChaosProfile>,
}

/// A chaos update: either replaces the global profile, or sets/clears one
/// endpoint's override, depending on which field is present.
#[derive(Debug, Deserialize)]
pub struct ChaosUpdateRequest {
    pub global: Option<ChaosProfile>,
    pub endpoint_key: Option<String>,
    pub profile: Option<ChaosProfile>,
}

async fn get_chaos(State(engine): State<Arc<Engine>>) -> Json<ChaosView> {
    Json(ChaosView { global: engine.chaos.global(), endpoints: engine.chaos.endpoint_overrides() })
}

async fn update_chaos(State(engine): State<Arc<Engine>>, Json(request): Json<ChaosUpdateRequest>) -> Json<ChaosView> {
    if let Some(global) = request.global {
        engine.chaos.set_global(global);
    }
    if let Some(endpoint_key) = request.endpoint_key {
        match request.profile {
            Some(profile) => engine.chaos.set_endpoint(&endpoint_key, profile),
            None => engine.chaos.clear_endpoint(&endpoint_key),
        }
    }
    Json(ChaosView { global: engine.chaos.global(), endpoints: engine.chaos.endpoint_overrides() })
}

/// Router for `GET|POST /admin/chaos`.
pub fn router() -> Router<Arc<Engine>> {
    Router::new().route("/", get(get_chaos).post(update_chaos))
}
