use axum::extract::State;
use std::sync::Arc;

use super::CurrentUser;
use super::repository::UserRepository;
use super::service::{
    AuthResponse, GoogleLoginRequest, LoginRequest, SignupRequest, UpdateMeRequest, UserResponse,
};
use crate::activity::{ActivityEntry, ActivityService, RequestMeta};
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ValidatedJson, created, ok};

/// Register a new user
///
/// POST /api/v1/auth/signup
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> ApiResult<AuthResponse> {
    let resp = state.auth.signup(state.pool(), &req).await?;
    ActivityService::log(
        state.pool(),
        ActivityEntry::auth("user.signup", resp.user.id),
        &meta,
    )
    .await;
    created(resp)
}

/// Login user
///
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let resp = state.auth.login(state.pool(), &req).await?;
    ActivityService::log(
        state.pool(),
        ActivityEntry::auth("user.login", resp.user.id),
        &meta,
    )
    .await;
    ok(resp)
}

/// Sign in with a Google ID token
///
/// POST /api/v1/auth/google
#[utoipa::path(
    post,
    path = "/api/v1/auth/google",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Malformed credential payload"),
        (status = 401, description = "Credential rejected"),
        (status = 503, description = "Google unreachable")
    ),
    tag = "Auth"
)]
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<GoogleLoginRequest>,
) -> ApiResult<AuthResponse> {
    let profile = state.google.verify(&req.credential).await?;
    let (resp, is_new) = state
        .auth
        .google_login(state.pool(), &profile, req.remember_me)
        .await?;

    let entry = ActivityEntry::auth("user.login.google", resp.user.id)
        .with_metadata(serde_json::json!({"new_user": is_new}));
    ActivityService::log(state.pool(), entry, &meta).await;
    ok(resp)
}

/// Current user profile
///
/// GET /api/v1/users/me
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
) -> ApiResult<UserResponse> {
    let row = UserRepository::find_by_id(state.pool(), user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    ok(row.into())
}

/// Update name or avatar
///
/// PATCH /api/v1/users/me
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<UpdateMeRequest>,
) -> ApiResult<UserResponse> {
    let row = UserRepository::update_profile(
        state.pool(),
        user.id,
        req.name.as_deref().map(str::trim),
        req.avatar_url.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;
    ok(row.into())
}
