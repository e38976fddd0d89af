use axum::extract::{Path, State};
use std::sync::Arc;

use super::service::HotspotService;
use super::types::{HotspotResponse, HotspotUpsert};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, MessageResponse, ValidatedJson, created, ok, parse_uuid};
use crate::product::service::INVALID_PRODUCT_ID;
use crate::user_auth::CurrentUser;

/// Hotspots of a product
///
/// GET /api/v1/products/{product_id}/hotspots
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/hotspots",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Hotspots ordered by order_index", body = ApiResponse<Vec<HotspotResponse>>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Hotspots"
)]
pub async fn list_hotspots(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> ApiResult<Vec<HotspotResponse>> {
    let product_id = parse_uuid(&product_id, INVALID_PRODUCT_ID)?;
    ok(HotspotService::list(state.pool(), product_id, user.id).await?)
}

/// Create or update a hotspot
///
/// POST /api/v1/hotspots
#[utoipa::path(
    post,
    path = "/api/v1/hotspots",
    request_body = HotspotUpsert,
    responses(
        (status = 201, description = "Saved hotspot", body = ApiResponse<HotspotResponse>),
        (status = 400, description = "Invalid position, dimension type or foreign hotspot"),
        (status = 404, description = "Product or hotspot not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Hotspots"
)]
pub async fn upsert_hotspot(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<HotspotUpsert>,
) -> ApiResult<HotspotResponse> {
    created(HotspotService::upsert(state.pool(), user.id, &req).await?)
}

/// Delete a hotspot
///
/// DELETE /api/v1/products/{product_id}/hotspots/{hotspot_id}
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}/hotspots/{hotspot_id}",
    params(
        ("product_id" = String, Path, description = "Product UUID"),
        ("hotspot_id" = String, Path, description = "Hotspot UUID")
    ),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Invalid ids or hotspot of another product"),
        (status = 404, description = "Product or hotspot not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Hotspots"
)]
pub async fn delete_hotspot(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path((product_id, hotspot_id)): Path<(String, String)>,
) -> ApiResult<MessageResponse> {
    let product_id = parse_uuid(&product_id, INVALID_PRODUCT_ID)?;
    let hotspot_id = parse_uuid(&hotspot_id, "Invalid hotspotId format. Expected UUID string.")?;
    HotspotService::delete(state.pool(), product_id, hotspot_id, user.id).await?;
    ok(MessageResponse::new("Hotspot deleted successfully"))
}
