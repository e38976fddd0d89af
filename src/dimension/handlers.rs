use axum::extract::{Path, State};
use std::sync::Arc;

use super::service::DimensionService;
use super::types::{DimensionAck, DimensionView, DimensionsPayload};
use crate::activity::RequestMeta;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, ok, parse_uuid};
use crate::user_auth::CurrentUser;

const INVALID_PRODUCT_ID: &str = "Invalid productId";

/// Save dimensions (replace mode)
///
/// POST /api/v1/products/{product_id}/dimensions
///
/// Each dimension needs exactly two hotspots, one `start` and one `end`.
#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/dimensions",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = DimensionsPayload,
    responses(
        (status = 200, description = "Saved", body = ApiResponse<DimensionAck>),
        (status = 400, description = "Invalid productId or hotspot pair"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dimensions"
)]
pub async fn save_dimensions(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(product_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<DimensionsPayload>,
) -> ApiResult<DimensionAck> {
    let product_id = parse_uuid(&product_id, INVALID_PRODUCT_ID)?;
    ok(DimensionService::save(state.pool(), product_id, user.id, &payload.0, &meta).await?)
}

/// Replace dimensions
///
/// PUT /api/v1/products/{product_id}/dimensions
#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}/dimensions",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = DimensionsPayload,
    responses(
        (status = 200, description = "Saved", body = ApiResponse<DimensionAck>),
        (status = 400, description = "Invalid productId or hotspot pair"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dimensions"
)]
pub async fn replace_dimensions(
    state: State<Arc<AppState>>,
    user: axum::Extension<CurrentUser>,
    meta: RequestMeta,
    product_id: Path<String>,
    payload: ValidatedJson<DimensionsPayload>,
) -> ApiResult<DimensionAck> {
    save_dimensions(state, user, meta, product_id, payload).await
}

/// Dimensions of a product
///
/// GET /api/v1/products/{product_id}/dimensions
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/dimensions",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Dimensions with typed hotspots", body = ApiResponse<Vec<DimensionView>>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dimensions"
)]
pub async fn list_dimensions(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> ApiResult<Vec<DimensionView>> {
    let product_id = parse_uuid(&product_id, INVALID_PRODUCT_ID)?;
    ok(DimensionService::list(state.pool(), product_id, user.id).await?)
}

/// Delete all dimensions
///
/// DELETE /api/v1/products/{product_id}/dimensions
///
/// Ordinary hotspots are kept.
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}/dimensions",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<DimensionAck>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dimensions"
)]
pub async fn delete_dimensions(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(product_id): Path<String>,
) -> ApiResult<DimensionAck> {
    let product_id = parse_uuid(&product_id, INVALID_PRODUCT_ID)?;
    ok(DimensionService::delete(state.pool(), product_id, user.id, &meta).await?)
}
