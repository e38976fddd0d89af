use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;

use super::service::JobService;
use super::types::{AssetResponse, CreateJobRequest, JobResponse, JobStatusView};
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, ok};
use crate::user_auth::CurrentUser;

/// Start a standalone image-to-3D job
///
/// POST /api/v1/jobs
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 200, description = "Job submitted", body = ApiResponse<JobResponse>),
        (status = 400, description = "Invalid or unreachable imageURL"),
        (status = 403, description = "AI credit limit exceeded"),
        (status = 502, description = "Inference server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> ApiResult<JobResponse> {
    ok(JobService::create(&state, user.id, &req.image_url).await?)
}

/// Job status
///
/// GET /api/v1/jobs/{job_id}
///
/// Answers with the model service status body unchanged when it is reachable.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    params(("job_id" = String, Path, description = "Job UUID")),
    responses(
        (status = 200, description = "Provider status, or the stored job state", body = JobStatusView),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    JobService::status(&state, user.id, &job_id).await
}

/// Asset parts
///
/// GET /api/v1/assets/{asset_id}
#[utoipa::path(
    get,
    path = "/api/v1/assets/{asset_id}",
    params(("asset_id" = String, Path, description = "Asset UUID")),
    responses(
        (status = 200, description = "Asset with its parts", body = ApiResponse<AssetResponse>),
        (status = 404, description = "Asset not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(asset_id): Path<String>,
) -> ApiResult<AssetResponse> {
    ok(JobService::asset(&state, user.id, &asset_id).await?)
}
