//! `/admin/drift-alerts` (§6): list detected drift and resolve alerts.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use learnproxy_core::{DriftAlert, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AdminError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unresolved_only: bool,
}

#[derive(Debug, Serialize)]
pub struct DriftAlertList {
    pub alerts: Vec<DriftAlert>,
}

async fn list_alerts(State(engine): State<Arc<Engine>>, Query(query): Query<ListQuery>) -> Json<DriftAlertList> {
    let alerts =
        engine.drift.read().list(query.unresolved_only).into_iter().cloned().collect();
    Json(DriftAlertList { alerts })
}

async fn resolve_alert(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AdminError> {
    let resolved = engine.drift.write().resolve(&id);
    if !resolved {
        return Err(AdminError::not_found("DRIFT_ALERT_NOT_FOUND", format!("no such drift alert: {id}")));
    }
    Ok(Json(json!({ "id": id, "resolved": true })))
}

/// Router for `GET /admin/drift-alerts` and
/// `POST /admin/drift-alerts/{id}/resolve`.
pub fn router() -> Router<Arc<Engine>> {
    Router::new()
        .route("/", get(list_alerts))
        .route("/{id}/resolve", post(resolve_alert))
}
