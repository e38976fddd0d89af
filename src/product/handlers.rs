use axum::extract::{Multipart, Path, Query, State};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::background::{self, BackgroundRemovalResponse};
use super::generation::{GenerationRequest, create_product_with_image};
use super::service::{INVALID_PRODUCT_ID, ProductService};
use super::types::*;
use crate::activity::RequestMeta;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiResponse, ApiResult, ItemsResponse, MessageResponse, MultipartForm, Paged, ValidatedJson,
    created, ok, parse_uuid,
};
use crate::user_auth::CurrentUser;

/// CRUD routes answer an unparseable id the same way as an unknown one.
fn product_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found("Product not found"))
}

// ============================================================================
// CRUD
// ============================================================================

/// List products
///
/// GET /api/v1/products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Page of products", body = ApiResponse<Paged<ProductResponse>>),
        (status = 400, description = "Invalid paging or filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<Paged<ProductResponse>> {
    query.validate()?;
    ok(ProductService::list(state.pool(), user.id, &query).await?)
}

/// Create a product
///
/// POST /api/v1/products
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductCreate,
    responses(
        (status = 201, description = "Created product", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Product quota exceeded")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<ProductCreate>,
) -> ApiResult<ProductResponse> {
    created(ProductService::create(state.pool(), user.id, req, &meta).await?)
}

/// Product detail
///
/// GET /api/v1/products/{product_id}
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Product with configurator, background and links", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<ProductResponse> {
    ok(ProductService::get(state.pool(), user.id, product_id(&id)?).await?)
}

/// Partial update
///
/// PATCH /api/v1/products/{product_id}
#[utoipa::path(
    patch,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn patch_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ProductUpdate>,
) -> ApiResult<ProductResponse> {
    let id = product_id(&id)?;
    ok(ProductService::update(state.pool(), user.id, id, req, false, &meta).await?)
}

/// Full replace of the presentation fields
///
/// PUT /api/v1/products/{product_id}
#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = ProductCreate,
    responses(
        (status = 200, description = "Replaced product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn put_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ProductCreate>,
) -> ApiResult<ProductResponse> {
    let id = product_id(&id)?;
    ok(ProductService::update(state.pool(), user.id, id, req.into(), true, &meta).await?)
}

/// Delete a product
///
/// DELETE /api/v1/products/{product_id}
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<MessageResponse>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    ProductService::delete(state.pool(), user.id, product_id(&id)?, &meta).await?;
    ok(MessageResponse::new("Product deleted"))
}

/// Merge configurator settings
///
/// PATCH /api/v1/products/{product_id}/configurator
#[utoipa::path(
    patch,
    path = "/api/v1/products/{product_id}/configurator",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = ConfiguratorSettings,
    responses(
        (status = 200, description = "Merged settings", body = ApiResponse<ConfiguratorSettings>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_configurator(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ConfiguratorSettings>,
) -> ApiResult<ConfiguratorSettings> {
    let id = product_id(&id)?;
    ok(ProductService::update_configurator(state.pool(), user.id, id, req).await?)
}

/// Publish or unpublish
///
/// POST /api/v1/products/{product_id}/publish
#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/publish",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Publish state", body = ApiResponse<PublishResponse>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product has no completed 3D model")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn publish_product(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<PublishRequest>,
) -> ApiResult<PublishResponse> {
    let id = product_id(&id)?;
    ok(ProductService::publish(state.pool(), user.id, id, req.publish, &meta).await?)
}

// ============================================================================
// Details, assets and status
// ============================================================================

/// Commerce details
///
/// PUT /api/v1/products/{product_id}/details
#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}/details",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body = ProductDetailsUpdate,
    responses(
        (status = 200, description = "Updated details", body = ApiResponse<ProductDetailsResponse>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product, currency type or background not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_details(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ProductDetailsUpdate>,
) -> ApiResult<ProductDetailsResponse> {
    let id = parse_uuid(&id, INVALID_PRODUCT_ID)?;
    ok(ProductService::update_details(state.pool(), user.id, id, req).await?)
}

/// Viewer payload
///
/// GET /api/v1/products/{product_id}/assets
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/assets",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Mesh, images, background, links and dimensions", body = ApiResponse<ProductAssetsData>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_assets(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<ProductAssetsData> {
    let id = parse_uuid(&id, INVALID_PRODUCT_ID)?;
    ok(ProductService::assets(state.pool(), user.id, id).await?)
}

/// Viewer payload for embeds
///
/// GET /api/v1/public/products/{product_id}/assets
#[utoipa::path(
    get,
    path = "/api/v1/public/products/{product_id}/assets",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Mesh, images, background, links and dimensions", body = ApiResponse<ProductAssetsData>),
        (status = 400, description = "Invalid productId"),
        (status = 401, description = "Invalid basic credentials"),
        (status = 404, description = "Product not found")
    ),
    security(("basic_auth" = [])),
    tag = "Public"
)]
pub async fn get_public_assets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ProductAssetsData> {
    let id = parse_uuid(&id, INVALID_PRODUCT_ID)?;
    ok(ProductService::public_assets(state.pool(), id).await?)
}

/// Generation status
///
/// GET /api/v1/products/{product_id}/status
///
/// A ready product answers with its viewer payload.
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/status",
    params(("product_id" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Status or viewer payload", body = ApiResponse<ProductStatusView>),
        (status = 400, description = "Invalid productId"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<ProductStatusView> {
    let id = parse_uuid(&id, INVALID_PRODUCT_ID)?;
    ok(ProductService::status(state.pool(), user.id, id).await?)
}

/// Products of a user with their primary image
///
/// GET /api/v1/products/user/{user_id}/products
#[utoipa::path(
    get,
    path = "/api/v1/products/user/{user_id}/products",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Products", body = ApiResponse<ItemsResponse<ProductWithPrimaryAsset>>),
        (status = 400, description = "Invalid userId"),
        (status = 403, description = "Not the caller's products")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_user_products(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(owner): Path<String>,
) -> ApiResult<ItemsResponse<ProductWithPrimaryAsset>> {
    let owner = parse_uuid(&owner, "Invalid userId format. Expected UUID string.")?;
    let items = ProductService::user_products(state.pool(), user.id, owner).await?;
    ok(ItemsResponse { items })
}

// ============================================================================
// Image pipelines
// ============================================================================

/// Create a product from an image and start 3D generation
///
/// POST /api/v1/createProduct
#[utoipa::path(
    post,
    path = "/api/v1/createProduct",
    request_body(
        content_type = "multipart/form-data",
        description = "`name`, `image`, optional `target_format`, `asset_id`, `mesh_asset_id`"
    ),
    responses(
        (status = 201, description = "Product with the stored image URL", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Missing name or unsupported image"),
        (status = 403, description = "Quota exceeded"),
        (status = 503, description = "Storage is not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product_from_image(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    multipart: Multipart,
) -> ApiResult<ProductResponse> {
    let req = GenerationRequest::from_form(MultipartForm::read(multipart).await?)?;
    created(create_product_with_image(&state, user.id, req, &meta).await?)
}

/// Remove the background of a product image
///
/// POST /api/v1/products/{product_id}/remove-background
#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/remove-background",
    params(("product_id" = String, Path, description = "Product UUID")),
    request_body(content_type = "multipart/form-data", description = "Form with an `image` part"),
    responses(
        (status = 200, description = "Stored cut-out", body = ApiResponse<BackgroundRemovalResponse>),
        (status = 400, description = "Invalid productId or file type"),
        (status = 404, description = "Product not found"),
        (status = 502, description = "Background removal failed"),
        (status = 503, description = "Background removal or storage not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<BackgroundRemovalResponse> {
    let id = parse_uuid(&id, INVALID_PRODUCT_ID)?;
    let mut form = MultipartForm::read(multipart).await?;
    let image = form.take_file("image")?;
    ok(background::remove_background(&state, user.id, id, image).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_maps_garbage_to_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(product_id(&format!(" {} ", id)).unwrap(), id);
        let err = product_id("chair").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
        assert_eq!(err.to_string(), "Product not found");
    }
}
