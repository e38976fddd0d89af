use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::collections::HashSet;
use uuid::Uuid;

use super::types::{GalleryRef, GallerySettings};
use crate::db::{SafeRow, json_text};
use crate::slug::like_pattern;

#[derive(Debug, Clone)]
pub struct GalleryRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_public: bool,
    pub settings: GallerySettings,
    pub product_count: i64,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

const GALLERY_COLUMNS: &str = r#"
    g.id, g.org_id, g.name, g.slug, g.is_public, g.settings, g.created_date, g.updated_date,
    (SELECT COUNT(*) FROM tbl_gallery_items gi WHERE gi.gallery_id = g.id) AS product_count
"#;

impl GalleryRow {
    fn from_row(r: &PgRow) -> Self {
        let settings: Option<String> = r.try_get_opt("settings");
        Self {
            id: r.get("id"),
            org_id: r.get("org_id"),
            name: r.get("name"),
            slug: r.get("slug"),
            is_public: r.get("is_public"),
            settings: json_text(settings.as_deref()),
            product_count: r.get("product_count"),
            created_date: r.get("created_date"),
            updated_date: r.get("updated_date"),
        }
    }
}

pub struct GalleryRepository;

impl GalleryRepository {
    /// Page of an organisation's galleries and the total matching `q`.
    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        q: Option<&str>,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<GalleryRow>, i64), sqlx::Error> {
        let pattern = q.map(|q| format!("%{}%", q));
        let where_clause = "WHERE g.org_id = $1 AND ($2::text IS NULL OR g.name ILIKE $2)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tbl_galleries g {}", where_clause))
                .bind(org_id)
                .bind(&pattern)
                .fetch_one(pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM tbl_galleries g {} ORDER BY {} LIMIT $3 OFFSET $4",
            GALLERY_COLUMNS, where_clause, order_by
        );
        let rows = sqlx::query(&sql)
            .bind(org_id)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        Ok((rows.iter().map(GalleryRow::from_row).collect(), total))
    }

    /// Gallery of the organisation named by `gallery`; a prefix matches the oldest.
    pub async fn find(
        conn: &mut PgConnection,
        org_id: Uuid,
        gallery: &GalleryRef,
    ) -> Result<Option<GalleryRow>, sqlx::Error> {
        let row = match gallery {
            GalleryRef::Id(id) => {
                let sql = format!(
                    "SELECT {} FROM tbl_galleries g WHERE g.id = $1 AND g.org_id = $2",
                    GALLERY_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(id)
                    .bind(org_id)
                    .fetch_optional(conn)
                    .await?
            }
            GalleryRef::Prefix(prefix) => {
                let sql = format!(
                    r#"
                    SELECT {} FROM tbl_galleries g
                    WHERE g.id::text LIKE $1 AND g.org_id = $2
                    ORDER BY g.created_date
                    LIMIT 1
                    "#,
                    GALLERY_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(format!("{}%", prefix))
                    .bind(org_id)
                    .fetch_optional(conn)
                    .await?
            }
        };
        Ok(row.as_ref().map(GalleryRow::from_row))
    }

    /// Slugs in the organisation starting with `base`, other than the one of `exclude`.
    pub async fn taken_slugs(
        conn: &mut PgConnection,
        org_id: Uuid,
        base: &str,
        exclude: Option<Uuid>,
    ) -> Result<HashSet<String>, sqlx::Error> {
        let slugs: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT slug FROM tbl_galleries
            WHERE org_id = $1
              AND slug LIKE $2 ESCAPE '\'
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(org_id)
        .bind(like_pattern(base))
        .bind(exclude)
        .fetch_all(conn)
        .await?;
        Ok(slugs.into_iter().collect())
    }

    pub async fn insert(
        conn: &mut PgConnection,
        org_id: Uuid,
        name: &str,
        slug: &str,
        is_public: bool,
        settings: &GallerySettings,
        user_id: Uuid,
    ) -> Result<GalleryRow, sqlx::Error> {
        let sql = format!(
            r#"
            WITH g AS (
                INSERT INTO tbl_galleries (org_id, name, slug, is_public, settings, created_by, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                RETURNING *
            )
            SELECT {} FROM g
            "#,
            GALLERY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(org_id)
            .bind(name)
            .bind(slug)
            .bind(is_public)
            .bind(serde_json::to_string(settings).unwrap_or_default())
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(GalleryRow::from_row(&row))
    }

    /// Write back name, slug, visibility and settings.
    pub async fn save(
        conn: &mut PgConnection,
        gallery: &GalleryRow,
        user_id: Uuid,
    ) -> Result<GalleryRow, sqlx::Error> {
        let sql = format!(
            r#"
            WITH g AS (
                UPDATE tbl_galleries
                SET name = $2, slug = $3, is_public = $4, settings = $5,
                    updated_by = $6, updated_date = now()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM g
            "#,
            GALLERY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(gallery.id)
            .bind(&gallery.name)
            .bind(&gallery.slug)
            .bind(gallery.is_public)
            .bind(serde_json::to_string(&gallery.settings).unwrap_or_default())
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(GalleryRow::from_row(&row))
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tbl_galleries WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Galleries of the organisation whose name matches `q`, newest first.
    pub async fn search(
        pool: &PgPool,
        org_id: Uuid,
        q: &str,
        limit: i64,
    ) -> Result<Vec<GalleryRow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM tbl_galleries g
            WHERE g.org_id = $1 AND g.name ILIKE $2
            ORDER BY g.created_date DESC
            LIMIT $3
            "#,
            GALLERY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(org_id)
            .bind(format!("%{}%", q))
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(GalleryRow::from_row).collect())
    }
}
