use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::hotspot::HotspotRepository;
use crate::db::SafeRow;

#[derive(Debug, Clone)]
pub struct DimensionGroupRow {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DimensionRow {
    pub dimension_type: Option<String>,
    pub dimension_name: Option<String>,
    pub value: Decimal,
    pub unit: String,
    pub start_hotspot_id: Option<Uuid>,
    pub end_hotspot_id: Option<Uuid>,
}

impl DimensionRow {
    /// Key of the measurement in the keyed form: type, then name, lowercased.
    pub fn key(&self) -> String {
        self.dimension_type
            .as_deref()
            .or(self.dimension_name.as_deref())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Display name in the list form.
    pub fn display_name(&self) -> String {
        self.dimension_name
            .clone()
            .or_else(|| self.dimension_type.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewDimension<'a> {
    pub product_id: Uuid,
    pub group_id: Uuid,
    pub name: &'a str,
    pub value: Decimal,
    pub unit: &'a str,
    pub start_hotspot_id: Uuid,
    pub end_hotspot_id: Uuid,
    pub order_index: i32,
    pub created_by: Uuid,
}

pub struct DimensionRepository;

impl DimensionRepository {
    /// Drop groups, dimensions and marker hotspots of a product.
    pub async fn delete_existing(conn: &mut PgConnection, product_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tbl_product_dimension_groups WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM tbl_product_dimensions WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        HotspotRepository::delete_dimension_markers(conn, product_id).await?;
        Ok(())
    }

    pub async fn create_group(
        conn: &mut PgConnection,
        product_id: Uuid,
        name: &str,
        user_id: Uuid,
    ) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tbl_product_dimension_groups (product_id, name, order_index, created_by)
            VALUES ($1, $2, 0, $3)
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(user_id)
        .fetch_one(conn)
        .await
    }

    pub async fn insert(conn: &mut PgConnection, dim: &NewDimension<'_>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tbl_product_dimensions
                (product_id, dimension_group_id, dimension_name, value, unit,
                 start_hotspot_id, end_hotspot_id, order_index, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(dim.product_id)
        .bind(dim.group_id)
        .bind(dim.name)
        .bind(dim.value)
        .bind(dim.unit)
        .bind(dim.start_hotspot_id)
        .bind(dim.end_hotspot_id)
        .bind(dim.order_index)
        .bind(dim.created_by)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn groups(pool: &PgPool, product_id: Uuid) -> Result<Vec<DimensionGroupRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name FROM tbl_product_dimension_groups WHERE product_id = $1 ORDER BY order_index",
        )
        .bind(product_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| DimensionGroupRow {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }

    pub async fn by_group(pool: &PgPool, group_id: Uuid) -> Result<Vec<DimensionRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT dimension_type, dimension_name, value, unit, start_hotspot_id, end_hotspot_id
            FROM tbl_product_dimensions
            WHERE dimension_group_id = $1
            ORDER BY dimension_type, order_index
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| DimensionRow {
                dimension_type: r.try_get_opt("dimension_type"),
                dimension_name: r.try_get_opt("dimension_name"),
                value: r.get("value"),
                unit: r.get("unit"),
                start_hotspot_id: r.try_get_opt("start_hotspot_id"),
                end_hotspot_id: r.try_get_opt("end_hotspot_id"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dimension_type: Option<&str>, dimension_name: Option<&str>) -> DimensionRow {
        DimensionRow {
            dimension_type: dimension_type.map(str::to_string),
            dimension_name: dimension_name.map(str::to_string),
            value: Decimal::new(8050, 2),
            unit: "cm".into(),
            start_hotspot_id: None,
            end_hotspot_id: None,
        }
    }

    #[test]
    fn test_key_prefers_type() {
        assert_eq!(row(Some("Width"), Some("Seat Width")).key(), "width");
        assert_eq!(row(None, Some("Seat Width")).key(), "seat width");
        assert_eq!(row(None, None).key(), "unknown");
    }

    #[test]
    fn test_display_name_prefers_name() {
        assert_eq!(row(Some("width"), Some("Seat Width")).display_name(), "Seat Width");
        assert_eq!(row(Some("width"), None).display_name(), "width");
    }
}
