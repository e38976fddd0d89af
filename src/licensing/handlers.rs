use axum::extract::State;
use std::sync::Arc;

use super::plans::{self, PlanSummary};
use super::subscription::{SubscriptionMe, SubscriptionService};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ok};
use crate::user_auth::CurrentUser;

/// Current plan, trial and quota usage
///
/// GET /api/v1/subscriptions/me
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/me",
    responses(
        (status = 200, description = "Subscription summary", body = ApiResponse<SubscriptionMe>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Subscriptions"
)]
pub async fn get_my_subscription(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
) -> ApiResult<SubscriptionMe> {
    ok(SubscriptionService::get_user_subscription(state.pool(), user.id).await?)
}

/// Available plans
///
/// GET /api/v1/subscriptions/plans
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/plans",
    responses(
        (status = 200, description = "Plan catalogue", body = ApiResponse<Vec<PlanSummary>>)
    ),
    tag = "Subscriptions"
)]
pub async fn list_plans() -> ApiResult<Vec<PlanSummary>> {
    ok(plans::catalogue())
}
