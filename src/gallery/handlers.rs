use axum::extract::{Path, Query, State};
use std::sync::Arc;
use validator::Validate;

use super::service::GalleryService;
use super::types::{GalleryCreate, GalleryListQuery, GalleryResponse, GalleryUpdate};
use crate::activity::RequestMeta;
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiResponse, ApiResult, MessageResponse, Paged, ValidatedJson, created, ok,
};
use crate::user_auth::CurrentUser;

/// List galleries
///
/// GET /api/v1/galleries
#[utoipa::path(
    get,
    path = "/api/v1/galleries",
    params(GalleryListQuery),
    responses(
        (status = 200, description = "Page of galleries", body = ApiResponse<Paged<GalleryResponse>>),
        (status = 403, description = "Plan without gallery access")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn list_galleries(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Query(query): Query<GalleryListQuery>,
) -> ApiResult<Paged<GalleryResponse>> {
    query.validate()?;
    ok(GalleryService::list(state.pool(), user.id, &query).await?)
}

/// Create a gallery
///
/// POST /api/v1/galleries
#[utoipa::path(
    post,
    path = "/api/v1/galleries",
    request_body = GalleryCreate,
    responses(
        (status = 201, description = "Created gallery", body = ApiResponse<GalleryResponse>),
        (status = 403, description = "Plan without galleries or gallery limit reached")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn create_gallery(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<GalleryCreate>,
) -> ApiResult<GalleryResponse> {
    created(GalleryService::create(state.pool(), user.id, req, &meta).await?)
}

/// Gallery detail
///
/// GET /api/v1/galleries/{gallery_id}
#[utoipa::path(
    get,
    path = "/api/v1/galleries/{gallery_id}",
    params(("gallery_id" = String, Path, description = "Gallery UUID or gallery-xxxxxxxx")),
    responses(
        (status = 200, description = "Gallery", body = ApiResponse<GalleryResponse>),
        (status = 403, description = "Plan without gallery access"),
        (status = 404, description = "Gallery not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn get_gallery(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Path(gallery_id): Path<String>,
) -> ApiResult<GalleryResponse> {
    ok(GalleryService::get(state.pool(), user.id, &gallery_id).await?)
}

/// Partial update
///
/// PATCH /api/v1/galleries/{gallery_id}
#[utoipa::path(
    patch,
    path = "/api/v1/galleries/{gallery_id}",
    params(("gallery_id" = String, Path, description = "Gallery UUID or gallery-xxxxxxxx")),
    request_body = GalleryUpdate,
    responses(
        (status = 200, description = "Updated gallery", body = ApiResponse<GalleryResponse>),
        (status = 403, description = "Plan without gallery access"),
        (status = 404, description = "Gallery not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn patch_gallery(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(gallery_id): Path<String>,
    ValidatedJson(req): ValidatedJson<GalleryUpdate>,
) -> ApiResult<GalleryResponse> {
    ok(GalleryService::update(state.pool(), user.id, &gallery_id, req, false, &meta).await?)
}

/// Full replace
///
/// PUT /api/v1/galleries/{gallery_id}
#[utoipa::path(
    put,
    path = "/api/v1/galleries/{gallery_id}",
    params(("gallery_id" = String, Path, description = "Gallery UUID or gallery-xxxxxxxx")),
    request_body = GalleryCreate,
    responses(
        (status = 200, description = "Replaced gallery", body = ApiResponse<GalleryResponse>),
        (status = 403, description = "Plan without gallery access"),
        (status = 404, description = "Gallery not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn put_gallery(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(gallery_id): Path<String>,
    ValidatedJson(req): ValidatedJson<GalleryCreate>,
) -> ApiResult<GalleryResponse> {
    ok(GalleryService::update(state.pool(), user.id, &gallery_id, req.into(), true, &meta).await?)
}

/// Delete a gallery
///
/// DELETE /api/v1/galleries/{gallery_id}
#[utoipa::path(
    delete,
    path = "/api/v1/galleries/{gallery_id}",
    params(("gallery_id" = String, Path, description = "Gallery UUID or gallery-xxxxxxxx")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<MessageResponse>),
        (status = 403, description = "Plan without gallery access"),
        (status = 404, description = "Gallery not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Galleries"
)]
pub async fn delete_gallery(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    meta: RequestMeta,
    Path(gallery_id): Path<String>,
) -> ApiResult<MessageResponse> {
    GalleryService::delete(state.pool(), user.id, &gallery_id, &meta).await?;
    ok(MessageResponse::new("Gallery deleted"))
}
