use axum::extract::{Query, State};
use std::sync::Arc;

use super::service::{AnalyticsService, DashboardService};
use super::types::{AnalyticsEventRequest, AnalyticsOverview, DashboardOverview, EventTracked, OverviewQuery};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, ok};
use crate::user_auth::CurrentUser;

/// Analytics overview
///
/// GET /api/v1/analytics/overview
#[utoipa::path(
    get,
    path = "/api/v1/analytics/overview",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Summary, daily views and top products", body = ApiResponse<AnalyticsOverview>),
        (status = 400, description = "Invalid date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<AnalyticsOverview> {
    ok(AnalyticsService::overview(state.pool(), user.id, &query).await?)
}

/// Track a viewer event
///
/// POST /api/v1/analytics/events
///
/// Public: called by embedded viewers without credentials.
#[utoipa::path(
    post,
    path = "/api/v1/analytics/events",
    request_body = AnalyticsEventRequest,
    responses(
        (status = 200, description = "Event stored", body = ApiResponse<EventTracked>),
        (status = 400, description = "Invalid event")
    ),
    tag = "Analytics"
)]
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    ValidatedJson(event): ValidatedJson<AnalyticsEventRequest>,
) -> ApiResult<EventTracked> {
    AnalyticsService::track(state.pool(), &event).await?;
    ok(EventTracked { tracked: true })
}

/// Dashboard overview
///
/// GET /api/v1/dashboard/overview
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/overview",
    responses(
        (status = 200, description = "Resume cards and insights", body = ApiResponse<DashboardOverview>)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
) -> ApiResult<DashboardOverview> {
    ok(DashboardService::overview(state.pool(), user.id).await?)
}
