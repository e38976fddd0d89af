//! SQL for `tbl_products` and the tables hanging off it
//! (`tbl_configurators`, `tbl_publish_links`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::collections::HashSet;
use uuid::Uuid;

use super::types::{ConfiguratorSettings, ProductStatus, ProductWithPrimaryAsset};
use crate::db::{SafeRow, json_text};
use crate::slug::like_pattern;

/// Presentation fields kept in the `metadata` JSON column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_overlay: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub status: ProductStatus,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub currency_type: Option<i32>,
    /// Background id (`tbl_background.id`)
    pub background_id: Option<i32>,
    pub metadata: ProductMetadata,
    pub created_by: Option<Uuid>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = r#"
    id, org_id, name, slug, status, description, price, currency_type, background_type,
    metadata, created_by, created_date, updated_date
"#;

impl ProductRow {
    pub(crate) fn from_row(r: &PgRow) -> Self {
        let status: String = r.get("status");
        let metadata: Option<String> = r.try_get_opt("metadata");
        Self {
            id: r.get("id"),
            org_id: r.try_get_opt("org_id"),
            name: r.get("name"),
            slug: r.get("slug"),
            status: parse_status(&status),
            description: r.try_get_opt("description"),
            price: r.try_get_opt("price"),
            currency_type: r.try_get_opt("currency_type"),
            background_id: r.try_get_opt("background_type"),
            metadata: json_text(metadata.as_deref()),
            created_by: r.try_get_opt("created_by"),
            created_date: r.get("created_date"),
            updated_date: r.get("updated_date"),
        }
    }
}

fn parse_status(raw: &str) -> ProductStatus {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("{}; treating as draft", e);
        ProductStatus::Draft
    })
}

/// Fields of a product being created.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub org_id: Option<Uuid>,
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub metadata: &'a ProductMetadata,
    pub created_by: Uuid,
}

/// Filters of the paged listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter<'a> {
    pub q: Option<&'a str>,
    pub status: Option<ProductStatus>,
    pub order_by: String,
    pub limit: i64,
    pub offset: i64,
}

pub struct ProductRepository;

impl ProductRepository {
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProductRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tbl_products WHERE id = $1 AND created_by = $2",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.as_ref().map(ProductRow::from_row))
    }

    /// Unscoped lookup for public viewers and background tasks.
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<ProductRow>, sqlx::Error> {
        let sql = format!("SELECT {} FROM tbl_products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
        Ok(row.as_ref().map(ProductRow::from_row))
    }

    pub async fn exists_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tbl_products WHERE id = $1 AND created_by = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Page of the user's products and the total matching the filter.
    pub async fn list_owned(
        pool: &PgPool,
        user_id: Uuid,
        filter: &ProductFilter<'_>,
    ) -> Result<(Vec<ProductRow>, i64), sqlx::Error> {
        let pattern = filter.q.map(|q| format!("%{}%", q));
        let status = filter.status.map(ProductStatus::as_str);
        let where_clause = r#"
            WHERE created_by = $1
              AND ($2::text IS NULL OR name ILIKE $2)
              AND ($3::text IS NULL OR status = $3)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tbl_products {}", where_clause))
                .bind(user_id)
                .bind(&pattern)
                .bind(status)
                .fetch_one(pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM tbl_products {} ORDER BY {} LIMIT $4 OFFSET $5",
            PRODUCT_COLUMNS, where_clause, filter.order_by
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(&pattern)
            .bind(status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await?;
        Ok((rows.iter().map(ProductRow::from_row).collect(), total))
    }

    /// Products of the organisation matching `q` by name, description or brand.
    pub async fn search(
        pool: &PgPool,
        org_id: Uuid,
        q: &str,
        limit: i64,
    ) -> Result<Vec<ProductRow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM tbl_products
            WHERE org_id = $1
              AND (name ILIKE $2
                   OR description ILIKE $2
                   OR (metadata IS NOT NULL AND metadata::jsonb ->> 'brand' ILIKE $2))
            ORDER BY updated_date DESC
            LIMIT $3
            "#,
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(org_id)
            .bind(format!("%{}%", q))
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(ProductRow::from_row).collect())
    }

    /// Slugs already starting with `base`, other than the one of `exclude`.
    pub async fn taken_slugs(
        conn: &mut PgConnection,
        base: &str,
        exclude: Option<Uuid>,
    ) -> Result<HashSet<String>, sqlx::Error> {
        let slugs: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT slug FROM tbl_products
            WHERE slug LIKE $1 ESCAPE '\'
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(like_pattern(base))
        .bind(exclude)
        .fetch_all(conn)
        .await?;
        Ok(slugs.into_iter().collect())
    }

    pub async fn insert(
        conn: &mut PgConnection,
        product: &NewProduct<'_>,
    ) -> Result<ProductRow, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO tbl_products
                (org_id, name, slug, status, description, metadata, created_by, updated_by)
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $6)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let metadata = serde_json::to_string(product.metadata).unwrap_or_default();
        let row = sqlx::query(&sql)
            .bind(product.org_id)
            .bind(product.name)
            .bind(product.slug)
            .bind(product.description)
            .bind(metadata)
            .bind(product.created_by)
            .fetch_one(conn)
            .await?;
        Ok(ProductRow::from_row(&row))
    }

    /// Write back the editable columns of `product`.
    pub async fn save(
        conn: &mut PgConnection,
        product: &ProductRow,
        user_id: Uuid,
    ) -> Result<ProductRow, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tbl_products
            SET name = $2, slug = $3, description = $4, metadata = $5, price = $6,
                currency_type = $7, background_type = $8, updated_by = $9, updated_date = now()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let metadata = serde_json::to_string(&product.metadata).unwrap_or_default();
        let row = sqlx::query(&sql)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(metadata)
            .bind(product.price)
            .bind(product.currency_type)
            .bind(product.background_id)
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(ProductRow::from_row(&row))
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: ProductStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tbl_products SET status = $2, updated_date = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Move `from` to `to`; returns whether the product was in `from`.
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: ProductStatus,
        to: ProductStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tbl_products SET status = $3, updated_date = now() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tbl_products WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Configurator
    // ========================================================================

    pub async fn configurator(
        pool: &PgPool,
        product_id: Uuid,
    ) -> Result<Option<ConfiguratorSettings>, sqlx::Error> {
        let settings: Option<Option<String>> =
            sqlx::query_scalar("SELECT settings FROM tbl_configurators WHERE product_id = $1")
                .bind(product_id)
                .fetch_optional(pool)
                .await?;
        Ok(settings.map(|raw| json_text(raw.as_deref())))
    }

    pub async fn upsert_configurator(
        conn: &mut PgConnection,
        product_id: Uuid,
        user_id: Uuid,
        settings: &ConfiguratorSettings,
    ) -> Result<(), sqlx::Error> {
        let raw = serde_json::to_string(settings).unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO tbl_configurators (product_id, settings, created_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO UPDATE
            SET settings = EXCLUDED.settings, updated_by = $3, updated_date = now()
            "#,
        )
        .bind(product_id)
        .bind(raw)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Publish links
    // ========================================================================

    /// Enable the product's publish link, creating it with `public_id` if missing.
    pub async fn enable_publish_link(
        conn: &mut PgConnection,
        product_id: Uuid,
        public_id: &str,
    ) -> Result<String, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tbl_publish_links (product_id, public_id, is_enabled)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (product_id) DO UPDATE SET is_enabled = TRUE
            RETURNING public_id
            "#,
        )
        .bind(product_id)
        .bind(public_id)
        .fetch_one(conn)
        .await
    }

    pub async fn disable_publish_link(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tbl_publish_links SET is_enabled = FALSE WHERE product_id = $1")
            .bind(product_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Owner listing
    // ========================================================================

    /// All products of a user, most recently touched first, each with its
    /// newest source image.
    pub async fn list_with_primary_image(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ProductWithPrimaryAsset>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.status, p.description, p.price, p.currency_type,
                   p.background_type, p.created_date, p.updated_date,
                   img.image, img.asset_name, img.asset_type_id
            FROM tbl_products p
            LEFT JOIN LATERAL (
                SELECT pa.image, a.name AS asset_name, a.assetid AS asset_type_id
                FROM tbl_product_asset_mapping m
                JOIN tbl_product_assets pa ON pa.id = m.product_asset_id
                JOIN tbl_asset a ON a.assetid = pa.asset_id
                WHERE m.productid = p.id AND m.isactive AND a.assetid = 1
                ORDER BY m.created_date DESC
                LIMIT 1
            ) img ON TRUE
            WHERE p.created_by = $1
            ORDER BY COALESCE(p.updated_date, p.created_date) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let status: String = r.get("status");
                let price: Option<i64> = r.try_get_opt("price");
                ProductWithPrimaryAsset {
                    id: r.get("id"),
                    name: r.get("name"),
                    status: parse_status(&status),
                    image: r.try_get_opt("image"),
                    asset_type: r.try_get_opt("asset_name"),
                    asset_type_id: r.try_get_opt("asset_type_id"),
                    description: r.try_get_opt("description"),
                    price: price.map(|p| p as f64),
                    currency_type: r.try_get_opt("currency_type"),
                    background_type: r.try_get_opt("background_type"),
                    created_at: r.get("created_date"),
                    updated_at: r.get("updated_date"),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_from_legacy_text() {
        let empty: ProductMetadata = json_text(None);
        assert_eq!(empty, ProductMetadata::default());
        let parsed: ProductMetadata = json_text(Some(r#"{"brand":"Acme","tags":["oak"]}"#));
        assert_eq!(parsed.brand.as_deref(), Some("Acme"));
        assert_eq!(parsed.tags, vec!["oak".to_string()]);
        assert!(parsed.accent_color.is_none());
    }

    #[test]
    fn test_unknown_status_reads_as_draft() {
        assert_eq!(parse_status("deleted"), ProductStatus::Draft);
        assert_eq!(parse_status("ready"), ProductStatus::Ready);
    }
}
