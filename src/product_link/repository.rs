use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::service::{LinkInput, LinkTypeResponse, ProductLinkResponse, ProductLinkUpdate};
use crate::db::SafeRow;

const LINK_COLUMNS: &str = r#"
    l.id, l.name, l.link, l.description, l.link_type, t.name AS link_type_name
"#;

fn link_from_row(r: &PgRow) -> ProductLinkResponse {
    let name: Option<String> = r.try_get_opt("name");
    let link: Option<String> = r.try_get_opt("link");
    ProductLinkResponse {
        id: r.get("id"),
        name: name.unwrap_or_default(),
        link: link.unwrap_or_default(),
        description: r.try_get_opt("description"),
        link_type_id: r.try_get_opt("link_type"),
        link_type_name: r.try_get_opt("link_type_name"),
    }
}

pub struct ProductLinkRepository;

impl ProductLinkRepository {
    pub async fn link_types(pool: &PgPool) -> Result<Vec<LinkTypeResponse>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, description FROM tbl_product_link_type WHERE isactive ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| LinkTypeResponse {
                id: r.get("id"),
                name: r.get("name"),
                description: r.try_get_opt("description"),
            })
            .collect())
    }

    /// Active link type ids among `ids`.
    pub async fn active_type_ids(
        conn: &mut PgConnection,
        ids: &[i32],
    ) -> Result<Vec<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM tbl_product_link_type WHERE isactive AND id = ANY($1)")
            .bind(ids)
            .fetch_all(conn)
            .await
    }

    pub async fn list_active(
        pool: &PgPool,
        product_id: Uuid,
    ) -> Result<Vec<ProductLinkResponse>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tbl_product_links l
            LEFT JOIN tbl_product_link_type t ON t.id = l.link_type
            WHERE l.productid = $1 AND l.isactive
            ORDER BY l.id
            "#,
            LINK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.to_string())
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(link_from_row).collect())
    }

    /// Active link whose product belongs to `user_id`.
    pub async fn find_owned(
        conn: &mut PgConnection,
        link_id: i32,
        user_id: Uuid,
    ) -> Result<Option<ProductLinkResponse>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tbl_product_links l
            JOIN tbl_products p ON p.id::text = l.productid
            LEFT JOIN tbl_product_link_type t ON t.id = l.link_type
            WHERE l.id = $1 AND l.isactive AND p.created_by = $2
            "#,
            LINK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(link_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.as_ref().map(link_from_row))
    }

    pub async fn insert(
        conn: &mut PgConnection,
        product_id: Uuid,
        user_id: Uuid,
        input: &LinkInput,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tbl_product_links
                (productid, name, link, description, link_type, isactive, created_by)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING id
            "#,
        )
        .bind(product_id.to_string())
        .bind(&input.name)
        .bind(&input.link)
        .bind(&input.description)
        .bind(input.link_type)
        .bind(user_id)
        .fetch_one(conn)
        .await
    }

    /// Soft-delete every active link of the product.
    pub async fn deactivate_all(
        conn: &mut PgConnection,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tbl_product_links
            SET isactive = FALSE, updated_by = $2, updated_date = now()
            WHERE productid = $1 AND isactive
            "#,
        )
        .bind(product_id.to_string())
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update(
        conn: &mut PgConnection,
        link_id: i32,
        user_id: Uuid,
        update: &ProductLinkUpdate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tbl_product_links
            SET name = COALESCE($2, name),
                link = COALESCE($3, link),
                description = COALESCE($4, description),
                link_type = COALESCE($5, link_type),
                updated_by = $6,
                updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(link_id)
        .bind(&update.name)
        .bind(&update.link)
        .bind(&update.description)
        .bind(update.link_type)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn soft_delete(
        conn: &mut PgConnection,
        link_id: i32,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tbl_product_links
            SET isactive = FALSE, updated_by = $2, updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(link_id)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
