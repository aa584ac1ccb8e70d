//! Structured error body for the `/admin` surface (§6, §7):
//! `{"error": "...", "code": "..."}`, built next to the domain logic that
//! detects each failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// An error surfaced to an admin API caller.
#[derive(Debug)]
pub struct AdminError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AdminError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code, message: message.into() }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, code, message: message.into() }
    }
}

impl From<learnproxy_core::Error> for AdminError {
    fn from(err: learnproxy_core::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, code: err.code(), message: err.to_string() }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message, "code": self.code}))).into_response()
    }
}
