use axum::extract::State;
use std::sync::Arc;

use super::service::{BrandingResponse, BrandingUpdate, OrganizationService};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, ok};
use crate::user_auth::CurrentUser;

/// Organisation branding
///
/// GET /api/v1/branding
#[utoipa::path(
    get,
    path = "/api/v1/branding",
    responses(
        (status = 200, description = "Branding settings", body = ApiResponse<BrandingResponse>),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Branding"
)]
pub async fn get_branding(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
) -> ApiResult<BrandingResponse> {
    ok(OrganizationService::get_branding(state.pool(), user.id).await?)
}

/// Update organisation branding
///
/// PATCH /api/v1/branding
#[utoipa::path(
    patch,
    path = "/api/v1/branding",
    request_body = BrandingUpdate,
    responses(
        (status = 200, description = "Updated branding", body = ApiResponse<BrandingResponse>),
        (status = 400, description = "Invalid colour or length"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Branding"
)]
pub async fn update_branding(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(update): ValidatedJson<BrandingUpdate>,
) -> ApiResult<BrandingResponse> {
    ok(OrganizationService::update_branding(state.pool(), user.id, &update).await?)
}
