use axum::extract::{Path, Query, State};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use super::service::{NotificationItem, NotificationService};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ItemsResponse, MessageResponse, ok, parse_uuid};
use crate::user_auth::CurrentUser;

/// Newest notifications returned per call.
const LIST_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only notifications not yet read
    #[serde(default)]
    pub unread: bool,
}

/// List notifications
///
/// GET /api/v1/notifications
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Newest notifications first", body = ApiResponse<ItemsResponse<NotificationItem>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<ItemsResponse<NotificationItem>> {
    let items = NotificationService::list(state.pool(), user.id, query.unread, LIST_LIMIT).await?;
    ok(ItemsResponse { items })
}

/// Mark a notification read
///
/// POST /api/v1/notifications/{notification_id}/read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    params(("notification_id" = String, Path, description = "Notification UUID")),
    responses(
        (status = 200, description = "Marked read", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Invalid notification id"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(notification_id): Path<String>,
) -> ApiResult<MessageResponse> {
    let id = parse_uuid(&notification_id, "Invalid notification id")?;
    NotificationService::mark_read(state.pool(), user.id, id).await?;
    ok(MessageResponse::new("Notification marked as read"))
}
