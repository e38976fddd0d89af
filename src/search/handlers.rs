use axum::extract::{Query, State};
use std::sync::Arc;
use validator::Validate;

use super::{SearchQuery, SearchResults, SearchService};
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ok};
use crate::user_auth::CurrentUser;

/// Search products and galleries
///
/// GET /api/v1/search
#[utoipa::path(
    get,
    path = "/api/v1/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching products and galleries", body = ApiResponse<SearchResults>),
        (status = 400, description = "Invalid query")
    ),
    security(("bearer_auth" = [])),
    tag = "Search"
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchResults> {
    query.validate()?;
    ok(SearchService::search(state.pool(), user.id, &query).await?)
}
