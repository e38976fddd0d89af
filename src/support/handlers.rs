use axum::extract::State;
use std::sync::Arc;

use super::{SupportCreateRequest, SupportResponse, SupportService};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, created};
use crate::user_auth::CurrentUser;

/// Contact support
///
/// POST /api/v1/support/contact
#[utoipa::path(
    post,
    path = "/api/v1/support/contact",
    request_body = SupportCreateRequest,
    responses(
        (status = 201, description = "Support request stored", body = ApiResponse<SupportResponse>),
        (status = 400, description = "Invalid user ID format"),
        (status = 403, description = "User ID does not match the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Support"
)]
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<SupportCreateRequest>,
) -> ApiResult<SupportResponse> {
    created(SupportService::create(state.pool(), user.id, &req).await?)
}
