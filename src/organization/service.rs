use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{SafeRow, json_text};
use crate::error::AppError;
use crate::gateway::types::HEX_COLOR;
use crate::slug::slugify;

pub const DEFAULT_PRIMARY_COLOR: &str = "#2563EB";

/// Branding as returned by the API
#[derive(Debug, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrandingResponse {
    pub logo_url: Option<String>,
    #[schema(example = "#2563EB")]
    pub primary_color: String,
    pub secondary_color: Option<String>,
    pub company_name: Option<String>,
    pub tagline: Option<String>,
}

/// Partial branding update
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrandingUpdate {
    pub logo_url: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub primary_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub secondary_color: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(length(max = 500))]
    pub tagline: Option<String>,
}

/// Render stored branding, filling defaults from the organisation.
pub fn branding_view(branding: &Map<String, Value>, org_name: &str) -> BrandingResponse {
    let text = |key: &str| branding.get(key).and_then(Value::as_str).map(str::to_string);
    BrandingResponse {
        logo_url: text("logo_url"),
        primary_color: text("primary_color").unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
        secondary_color: text("secondary_color"),
        company_name: text("company_name")
            .filter(|n| !n.is_empty())
            .or_else(|| Some(org_name.to_string())),
        tagline: text("tagline"),
    }
}

/// Overlay the provided fields on the stored branding.
pub fn apply_branding(branding: &mut Map<String, Value>, update: &BrandingUpdate) {
    let fields = [
        ("logo_url", &update.logo_url),
        ("primary_color", &update.primary_color),
        ("secondary_color", &update.secondary_color),
        ("company_name", &update.company_name),
        ("tagline", &update.tagline),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            branding.insert(key.to_string(), Value::String(v.clone()));
        }
    }
}

pub struct OrganizationService;

impl OrganizationService {
    /// First organisation the user belongs to.
    pub async fn find_org_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT org_id FROM tbl_org_members WHERE user_id = $1 ORDER BY created_date LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Existing membership, or a personal organisation owned by the user.
    pub async fn get_or_create_org_id(
        pool: &PgPool,
        user_id: Uuid,
        display_name: Option<&str>,
    ) -> Result<Uuid, sqlx::Error> {
        if let Some(org_id) = Self::find_org_id(pool, user_id).await? {
            return Ok(org_id);
        }

        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("personal");
        let slug = Some(slugify(name))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "user".to_string());

        let mut tx = pool.begin().await?;
        let org_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tbl_organizations (name, slug, created_by)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(&slug)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tbl_org_members (org_id, user_id, role, created_by)
            VALUES ($1, $2, 'owner', $2)
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(%user_id, %org_id, "Personal organization created");
        Ok(org_id)
    }

    async fn load(pool: &PgPool, org_id: Uuid) -> Result<(String, Map<String, Value>), AppError> {
        let row = sqlx::query(
            "SELECT name, branding FROM tbl_organizations WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(org_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Organization not found"))?;

        let branding: Option<String> = row.try_get_opt("branding");
        Ok((row.get("name"), json_text(branding.as_deref())))
    }

    async fn member_org(pool: &PgPool, user_id: Uuid) -> Result<Uuid, AppError> {
        Self::find_org_id(pool, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))
    }

    pub async fn get_branding(pool: &PgPool, user_id: Uuid) -> Result<BrandingResponse, AppError> {
        let org_id = Self::member_org(pool, user_id).await?;
        let (name, branding) = Self::load(pool, org_id).await?;
        Ok(branding_view(&branding, &name))
    }

    pub async fn update_branding(
        pool: &PgPool,
        user_id: Uuid,
        update: &BrandingUpdate,
    ) -> Result<BrandingResponse, AppError> {
        let org_id = Self::member_org(pool, user_id).await?;
        let (name, mut branding) = Self::load(pool, org_id).await?;
        apply_branding(&mut branding, update);

        sqlx::query(
            r#"
            UPDATE tbl_organizations
            SET branding = $2, updated_by = $3, updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(org_id)
        .bind(Value::Object(branding.clone()).to_string())
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(branding_view(&branding, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_branding_defaults() {
        let view = branding_view(&Map::new(), "Acme");
        assert_eq!(view.primary_color, DEFAULT_PRIMARY_COLOR);
        assert_eq!(view.company_name.as_deref(), Some("Acme"));
        assert!(view.logo_url.is_none());
    }

    #[test]
    fn test_apply_branding_keeps_unset_fields() {
        let mut branding = json!({"tagline": "Old", "primary_color": "#000000"})
            .as_object()
            .cloned()
            .unwrap();
        let update = BrandingUpdate {
            primary_color: Some("#FFFFFF".into()),
            company_name: Some("Rivollo".into()),
            ..Default::default()
        };
        apply_branding(&mut branding, &update);
        let view = branding_view(&branding, "ignored");
        assert_eq!(view.primary_color, "#FFFFFF");
        assert_eq!(view.tagline.as_deref(), Some("Old"));
        assert_eq!(view.company_name.as_deref(), Some("Rivollo"));
    }

    #[test]
    fn test_branding_update_validation() {
        let bad = BrandingUpdate {
            primary_color: Some("blue".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let long = BrandingUpdate {
            tagline: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_branding_serializes_camel_case() {
        let json = serde_json::to_value(branding_view(&Map::new(), "Acme")).unwrap();
        assert_eq!(json["primaryColor"], "#2563EB");
        assert_eq!(json["companyName"], "Acme");
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_personal_org_is_reused() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .expect("connect");
        let pool = db.pool();
        let email = format!("org-{}@example.com", Uuid::new_v4());
        let user_id: Uuid = sqlx::query_scalar("INSERT INTO tbl_users (email) VALUES ($1) RETURNING id")
            .bind(&email)
            .fetch_one(pool)
            .await
            .unwrap();

        let first = OrganizationService::get_or_create_org_id(pool, user_id, Some("Jane Doe"))
            .await
            .unwrap();
        let second = OrganizationService::get_or_create_org_id(pool, user_id, None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
