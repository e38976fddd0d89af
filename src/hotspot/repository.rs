use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::types::{HotspotAction, HotspotPosition, HotspotResponse};
use crate::db::json_text;
use crate::db::SafeRow;

/// Description prefix of hotspots owned by the dimensions API.
pub const DIMENSION_MARKER_PREFIX: &str = "Dimension marker: ";

#[derive(Debug, Clone)]
pub struct HotspotRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub label: String,
    pub description: Option<String>,
    pub position: HotspotPosition,
    pub text_font: Option<String>,
    pub text_color: Option<String>,
    pub bg_color: Option<String>,
    pub action_type: HotspotAction,
    /// JSON object as text
    pub action_payload: Option<String>,
    pub order_index: i32,
    pub hotspot_type: Option<i32>,
    pub created_at: DateTime<Utc>,
}

const HOTSPOT_COLUMNS: &str = r#"
    id, product_id, label, description, pos_x, pos_y, pos_z, text_font, text_color, bg_color,
    action_type, action_payload, order_index, hotspot_type, created_at
"#;

impl HotspotRow {
    fn from_row(r: &PgRow) -> Self {
        let action: String = r.get("action_type");
        Self {
            id: r.get("id"),
            product_id: r.get("product_id"),
            label: r.get("label"),
            description: r.try_get_opt("description"),
            position: HotspotPosition {
                x: r.get("pos_x"),
                y: r.get("pos_y"),
                z: r.get("pos_z"),
            },
            text_font: r.try_get_opt("text_font"),
            text_color: r.try_get_opt("text_color"),
            bg_color: r.try_get_opt("bg_color"),
            action_type: HotspotAction::parse_lenient(Some(&action)),
            action_payload: r.try_get_opt("action_payload"),
            order_index: r.get("order_index"),
            hotspot_type: r.try_get_opt("hotspot_type"),
            created_at: r.get("created_at"),
        }
    }
}

impl From<HotspotRow> for HotspotResponse {
    fn from(row: HotspotRow) -> Self {
        Self {
            id: row.id,
            title: row.label,
            description: row.description.unwrap_or_default(),
            position: row.position,
            text_font: row.text_font,
            text_color: row.text_color,
            bg_color: row.bg_color,
            action_type: row.action_type,
            action_payload: json_text(row.action_payload.as_deref()),
            hotspot_type: row.hotspot_type,
            order_index: row.order_index,
            created_at: row.created_at,
        }
    }
}

/// Column values written on insert and update.
#[derive(Debug, Clone)]
pub struct HotspotFields<'a> {
    pub label: &'a str,
    pub description: Option<&'a str>,
    pub position: HotspotPosition,
    pub text_font: Option<&'a str>,
    pub text_color: Option<&'a str>,
    pub bg_color: Option<&'a str>,
    pub action_type: HotspotAction,
    pub action_payload: Option<String>,
    pub hotspot_type: Option<i32>,
}

impl<'a> HotspotFields<'a> {
    /// Plain marker with no styling or action.
    pub fn marker(label: &'a str, description: &'a str, position: HotspotPosition) -> Self {
        Self {
            label,
            description: Some(description),
            position,
            text_font: None,
            text_color: None,
            bg_color: None,
            action_type: HotspotAction::None,
            action_payload: None,
            hotspot_type: None,
        }
    }
}

pub struct HotspotRepository;

impl HotspotRepository {
    /// Hotspots of a product in display order.
    pub async fn list_for_product(
        pool: &PgPool,
        product_id: Uuid,
    ) -> Result<Vec<HotspotRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tbl_hotspots WHERE product_id = $1 ORDER BY order_index ASC",
            HOTSPOT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(product_id).fetch_all(pool).await?;
        Ok(rows.iter().map(HotspotRow::from_row).collect())
    }

    pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<HotspotRow>, sqlx::Error> {
        let sql = format!("SELECT {} FROM tbl_hotspots WHERE id = $1", HOTSPOT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(conn).await?;
        Ok(row.as_ref().map(HotspotRow::from_row))
    }

    /// Hotspots of the given ids, in no particular order.
    pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<HotspotRow>, sqlx::Error> {
        let sql = format!("SELECT {} FROM tbl_hotspots WHERE id = ANY($1)", HOTSPOT_COLUMNS);
        let rows = sqlx::query(&sql).bind(ids).fetch_all(pool).await?;
        Ok(rows.iter().map(HotspotRow::from_row).collect())
    }

    /// `max(order_index) + 1`, or 0 for a product without hotspots.
    pub async fn next_order_index(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM tbl_hotspots WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(conn)
        .await
    }

    /// Name of a hotspot type, if it exists.
    pub async fn type_name(conn: &mut PgConnection, type_id: i32) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT name FROM tbl_hotspot_type WHERE id = $1")
            .bind(type_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn insert(
        conn: &mut PgConnection,
        product_id: Uuid,
        fields: &HotspotFields<'_>,
        order_index: i32,
        user_id: Uuid,
    ) -> Result<HotspotRow, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO tbl_hotspots
                (product_id, label, description, pos_x, pos_y, pos_z, text_font, text_color,
                 bg_color, action_type, action_payload, order_index, hotspot_type, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            HOTSPOT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(product_id)
            .bind(fields.label)
            .bind(fields.description)
            .bind(fields.position.x)
            .bind(fields.position.y)
            .bind(fields.position.z)
            .bind(fields.text_font)
            .bind(fields.text_color)
            .bind(fields.bg_color)
            .bind(fields.action_type.as_str())
            .bind(&fields.action_payload)
            .bind(order_index)
            .bind(fields.hotspot_type)
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(HotspotRow::from_row(&row))
    }

    /// Overwrite every editable column; order and product stay.
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        fields: &HotspotFields<'_>,
        user_id: Uuid,
    ) -> Result<HotspotRow, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tbl_hotspots
            SET label = $2, description = $3, pos_x = $4, pos_y = $5, pos_z = $6,
                text_font = $7, text_color = $8, bg_color = $9, action_type = $10,
                action_payload = $11, hotspot_type = $12, updated_by = $13, updated_date = now()
            WHERE id = $1
            RETURNING {}
            "#,
            HOTSPOT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(fields.label)
            .bind(fields.description)
            .bind(fields.position.x)
            .bind(fields.position.y)
            .bind(fields.position.z)
            .bind(fields.text_font)
            .bind(fields.text_color)
            .bind(fields.bg_color)
            .bind(fields.action_type.as_str())
            .bind(&fields.action_payload)
            .bind(fields.hotspot_type)
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(HotspotRow::from_row(&row))
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tbl_hotspots WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Remove the markers created by the dimensions API; other hotspots stay.
    pub async fn delete_dimension_markers(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM tbl_hotspots WHERE product_id = $1 AND description LIKE 'Dimension marker:%'",
        )
        .bind(product_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_next_order_index_of_unknown_product_is_zero() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let next = HotspotRepository::next_order_index(&mut conn, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(next, 0);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_dimension_type_is_seeded() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let name = HotspotRepository::type_name(&mut conn, 2).await.unwrap();
        assert_eq!(name.as_deref(), Some("dimension"));
    }
}
