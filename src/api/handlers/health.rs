//! Health and readiness endpoints for probes and load balancers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::routes::ApiState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status (always "ok" when responding)
    #[schema(example = "ok")]
    pub status: String,
}

/// Liveness probe. Returns 200 OK whenever the server is responding.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok".to_string() }))
}

/// Readiness probe. Verifies the database before reporting ready.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Database unavailable", body = HealthResponse)
    )
)]
pub async fn readiness_handler(
    State(state): State<ApiState>,
) -> (StatusCode, Json<HealthResponse>) {
    let check = state.health_checker.check_database(&state.pool).await;

    if check.status.is_operational() {
        (StatusCode::OK, Json(HealthResponse { status: "ok".to_string() }))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "degraded".to_string() }))
    }
}
