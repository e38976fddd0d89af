//! Reference tables: currencies, background types and backgrounds.

use axum::extract::{Path, State};
use serde::Serialize;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::gateway::cache;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, ItemsResponse, ok};
use crate::db::SafeRow;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrencyTypeResponse {
    pub id: i32,
    #[schema(example = "INR")]
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub isactive: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct BackgroundTypeResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub isactive: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct BackgroundResponse {
    pub id: i32,
    pub background_type_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_type: Option<BackgroundTypeResponse>,
    pub name: String,
    pub description: Option<String>,
    pub isactive: bool,
    pub image: Option<String>,
}

impl BackgroundResponse {
    fn from_row(r: &PgRow) -> Self {
        let type_name: Option<String> = r.try_get_opt("type_name");
        let background_type = type_name.map(|name| BackgroundTypeResponse {
            id: r.get("type_id"),
            name,
            description: r.try_get_opt("type_description"),
            isactive: r.get("type_isactive"),
        });
        Self {
            id: r.get("id"),
            background_type_id: r.try_get_opt("background_type_id"),
            background_type,
            name: r.get("name"),
            description: r.try_get_opt("description"),
            isactive: r.get("isactive"),
            image: r.try_get_opt("image"),
        }
    }
}

pub struct ReferenceRepository;

impl ReferenceRepository {
    pub async fn currency_types(pool: &PgPool) -> Result<Vec<CurrencyTypeResponse>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, code, name, symbol, description, isactive FROM tbl_currencytype ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| CurrencyTypeResponse {
                id: r.get("id"),
                code: r.get("code"),
                name: r.get("name"),
                symbol: r.try_get_opt("symbol"),
                description: r.try_get_opt("description"),
                isactive: r.get("isactive"),
            })
            .collect())
    }

    pub async fn background_types(
        pool: &PgPool,
    ) -> Result<Vec<BackgroundTypeResponse>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, description, isactive FROM tbl_background_type ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| BackgroundTypeResponse {
                id: r.get("id"),
                name: r.get("name"),
                description: r.try_get_opt("description"),
                isactive: r.get("isactive"),
            })
            .collect())
    }

    /// Background with its type.
    pub async fn background(pool: &PgPool, id: i32) -> Result<Option<BackgroundResponse>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT b.id, b.background_type_id, b.name, b.description, b.isactive, b.image,
                   t.id AS type_id, t.name AS type_name, t.description AS type_description,
                   t.isactive AS type_isactive
            FROM tbl_background b
            LEFT JOIN tbl_background_type t ON t.id = b.background_type_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.as_ref().map(BackgroundResponse::from_row))
    }

    pub async fn currency_exists(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tbl_currencytype WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn background_exists(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tbl_background WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

/// Currency types
///
/// GET /api/v1/currencytypes
#[utoipa::path(
    get,
    path = "/api/v1/currencytypes",
    responses(
        (status = 200, description = "Currency types", body = ApiResponse<ItemsResponse<CurrencyTypeResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_currency_types(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ItemsResponse<CurrencyTypeResponse>> {
    let items = cache::load_currency_types_cached(state.pool().clone())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    ok(ItemsResponse { items })
}

/// Background types
///
/// GET /api/v1/backgroundtypes
#[utoipa::path(
    get,
    path = "/api/v1/backgroundtypes",
    responses(
        (status = 200, description = "Background types", body = ApiResponse<ItemsResponse<BackgroundTypeResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_background_types(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ItemsResponse<BackgroundTypeResponse>> {
    let items = cache::load_background_types_cached(state.pool().clone())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    ok(ItemsResponse { items })
}

/// Background by id
///
/// GET /api/v1/backgrounds/{backgroundid}
#[utoipa::path(
    get,
    path = "/api/v1/backgrounds/{backgroundid}",
    params(("backgroundid" = i32, Path, description = "Background id")),
    responses(
        (status = 200, description = "Background", body = ApiResponse<BackgroundResponse>),
        (status = 404, description = "Background not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn get_background(
    State(state): State<Arc<AppState>>,
    Path(background_id): Path<i32>,
) -> ApiResult<BackgroundResponse> {
    let background = cache::load_background_cached(state.pool().clone(), background_id)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
        .ok_or_else(|| AppError::not_found("Background not found"))?;
    ok(background)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_omits_missing_type() {
        let bg = BackgroundResponse {
            id: 1,
            background_type_id: None,
            background_type: None,
            name: "Studio White".into(),
            description: None,
            isactive: true,
            image: None,
        };
        let json = serde_json::to_value(bg).unwrap();
        assert!(json.get("background_type").is_none());
        assert_eq!(json["name"], "Studio White");
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_seeded_reference_rows() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .expect("connect");
        let currencies = ReferenceRepository::currency_types(db.pool()).await.unwrap();
        assert!(currencies.iter().any(|c| c.code == "INR"));
        let bg = ReferenceRepository::background(db.pool(), 1).await.unwrap().unwrap();
        assert_eq!(bg.background_type.unwrap().name, "solid");
        assert!(!ReferenceRepository::currency_exists(db.pool(), 9999).await.unwrap());
    }
}
