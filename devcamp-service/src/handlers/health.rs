//! Health check handler

use axum::Json;

use crate::responses::HealthResponse;

/// Liveness probe, always `200 {"status":"OK"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}
