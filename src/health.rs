use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Version of the HTTP contract, independent of the crate release.
pub const API_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: API_VERSION,
    })
}
