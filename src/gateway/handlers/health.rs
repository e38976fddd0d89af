//! Health, readiness and liveness handlers

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::ApiResponse;

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Health check response data
#[derive(serde::Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "rivollo_api")]
    pub service: String,
    /// `healthy` or `unhealthy: <reason>`
    #[schema(example = "healthy")]
    pub database: String,
}

#[derive(serde::Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
}

#[derive(serde::Serialize, ToSchema)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// Health check endpoint
///
/// Pings the database on every call. A failing database degrades the
/// status but the endpoint still answers 200 so load balancers can read it.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = ApiResponse<HealthResponse>, content_type = "application/json")
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let database = match state.db.health_check().await {
        Ok(()) => "healthy".to_string(),
        Err(e) => {
            tracing::error!("[HEALTH] Database ping failed: {}", e);
            format!("unhealthy: {}", e)
        }
    };
    let status = if database == "healthy" { "ok" } else { "degraded" };

    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthResponse {
            status: status.to_string(),
            service: SERVICE_NAME.to_string(),
            database,
        })),
    )
}

/// Readiness check
#[utoipa::path(
    get,
    path = "/api/v1/health/ready",
    responses(
        (status = 200, description = "Whether the database answers", body = ApiResponse<ReadinessResponse>)
    ),
    tag = "System"
)]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<ReadinessResponse>> {
    let ready = state.db.health_check().await.is_ok();
    Json(ApiResponse::success(ReadinessResponse { ready }))
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/api/v1/health/live",
    responses(
        (status = 200, description = "Process is up", body = ApiResponse<LivenessResponse>)
    ),
    tag = "System"
)]
pub async fn liveness_check() -> Json<ApiResponse<LivenessResponse>> {
    Json(ApiResponse::success(LivenessResponse { alive: true }))
}
