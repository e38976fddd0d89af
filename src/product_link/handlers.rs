use axum::extract::{Path, State};
use std::sync::Arc;

use super::service::{
    BulkLinkCreate, LinkTypeResponse, ProductLinkResponse, ProductLinkService, ProductLinkUpdate,
};
use crate::error::AppError;
use crate::gateway::cache;
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiResponse, ApiResult, ItemsResponse, MessageResponse, ValidatedJson, ok, parse_uuid,
};
use crate::user_auth::CurrentUser;

/// Link types
///
/// GET /api/v1/product-link-types
#[utoipa::path(
    get,
    path = "/api/v1/product-link-types",
    responses(
        (status = 200, description = "Active link types", body = ApiResponse<ItemsResponse<LinkTypeResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Product Links"
)]
pub async fn list_link_types(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ItemsResponse<LinkTypeResponse>> {
    let items = cache::load_link_types_cached(state.pool().clone())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    ok(ItemsResponse { items })
}

/// Append links to a product
///
/// POST /api/v1/products/{product_id}/links
#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/links",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = BulkLinkCreate,
    responses(
        (status = 200, description = "Created links", body = ApiResponse<ItemsResponse<ProductLinkResponse>>),
        (status = 400, description = "Invalid productId or link type"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Product Links"
)]
pub async fn create_links(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(product_id): Path<String>,
    ValidatedJson(req): ValidatedJson<BulkLinkCreate>,
) -> ApiResult<ItemsResponse<ProductLinkResponse>> {
    let product_id = parse_uuid(&product_id, "Invalid productId")?;
    let items =
        ProductLinkService::create_links(state.pool(), product_id, user.id, &req.links).await?;
    ok(ItemsResponse { items })
}

/// Active links of a product
///
/// GET /api/v1/products/{product_id}/links
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/links",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Links", body = ApiResponse<ItemsResponse<ProductLinkResponse>>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Product Links"
)]
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> ApiResult<ItemsResponse<ProductLinkResponse>> {
    let product_id = parse_uuid(&product_id, "Invalid productId")?;
    let items = ProductLinkService::list_links(state.pool(), product_id, user.id).await?;
    ok(ItemsResponse { items })
}

/// Update a link
///
/// PATCH /api/v1/links/{link_id}
#[utoipa::path(
    patch,
    path = "/api/v1/links/{link_id}",
    params(("link_id" = i32, Path, description = "Link id")),
    request_body = ProductLinkUpdate,
    responses(
        (status = 200, description = "Updated link", body = ApiResponse<ProductLinkResponse>),
        (status = 400, description = "Invalid link type"),
        (status = 404, description = "Link not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Product Links"
)]
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(link_id): Path<i32>,
    ValidatedJson(req): ValidatedJson<ProductLinkUpdate>,
) -> ApiResult<ProductLinkResponse> {
    ok(ProductLinkService::update_link(state.pool(), link_id, user.id, &req).await?)
}

/// Remove a link
///
/// DELETE /api/v1/links/{link_id}
#[utoipa::path(
    delete,
    path = "/api/v1/links/{link_id}",
    params(("link_id" = i32, Path, description = "Link id")),
    responses(
        (status = 200, description = "Link deleted", body = ApiResponse<MessageResponse>),
        (status = 404, description = "Link not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Product Links"
)]
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(link_id): Path<i32>,
) -> ApiResult<MessageResponse> {
    ProductLinkService::delete_link(state.pool(), link_id, user.id).await?;
    ok(MessageResponse::new("Link deleted successfully"))
}
