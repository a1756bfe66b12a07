//! Health check endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health — returns system health status. This is an observability
/// surface only; the CRUD HTTP surface spec.md places out of scope (§1) is
/// not part of this crate.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
