use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::types::{AnalyticsEventRequest, AnalyticsSummary, DailyCounter, TimeSeriesPoint, TopProduct};
use crate::db::SafeRow;

/// Draft or processing product shown on the dashboard.
#[derive(Debug, Clone)]
pub struct ResumeRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub metadata: Option<String>,
    pub thumbnail_url: Option<String>,
}

pub struct AnalyticsRepository;

impl AnalyticsRepository {
    // ========================================================================
    // Rollup reads
    // ========================================================================

    /// Counter totals for days in `[from, until]`, optionally one product.
    pub async fn summary(
        pool: &PgPool,
        org_id: Uuid,
        product_id: Option<Uuid>,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<AnalyticsSummary, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(views), 0)::BIGINT AS views,
                   COALESCE(SUM(engaged), 0)::BIGINT AS engaged,
                   COALESCE(SUM(adds_from_3d), 0)::BIGINT AS adds
            FROM tbl_analytics_daily_product
            WHERE org_id = $1
              AND day BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR product_id = $4)
            "#,
        )
        .bind(org_id)
        .bind(from)
        .bind(until)
        .bind(product_id)
        .fetch_one(pool)
        .await?;

        Ok(AnalyticsSummary {
            views: row.try_get_log("views").unwrap_or(0),
            engaged_views: row.try_get_log("engaged").unwrap_or(0),
            adds_from_3d: row.try_get_log("adds").unwrap_or(0),
        })
    }

    /// Views per day, oldest first; days without rows are absent.
    pub async fn daily_views(
        pool: &PgPool,
        org_id: Uuid,
        product_id: Option<Uuid>,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT day, COALESCE(SUM(views), 0)::BIGINT AS views
            FROM tbl_analytics_daily_product
            WHERE org_id = $1
              AND day BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR product_id = $4)
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(org_id)
        .bind(from)
        .bind(until)
        .bind(product_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| TimeSeriesPoint {
                date: r.get("day"),
                value: r.get("views"),
            })
            .collect())
    }

    /// Most viewed products of the organisation in `[from, until]`.
    pub async fn top_products(
        pool: &PgPool,
        org_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
        limit: i64,
    ) -> Result<Vec<TopProduct>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, COALESCE(SUM(d.views), 0)::BIGINT AS views
            FROM tbl_analytics_daily_product d
            JOIN tbl_products p ON p.id = d.product_id
            WHERE d.org_id = $1 AND d.day BETWEEN $2 AND $3
            GROUP BY p.id, p.name
            ORDER BY views DESC, p.name
            LIMIT $4
            "#,
        )
        .bind(org_id)
        .bind(from)
        .bind(until)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| TopProduct {
                id: r.get("id"),
                name: r.get("name"),
                views: r.get("views"),
            })
            .collect())
    }

    // ========================================================================
    // Event ingestion
    // ========================================================================

    pub async fn insert_event(
        conn: &mut PgConnection,
        event: &AnalyticsEventRequest,
        org_id: Option<Uuid>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tbl_analytics_events
                (org_id, product_id, publish_link_id, session_id, event_type, user_agent, ip_hash, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb)
            RETURNING id
            "#,
        )
        .bind(org_id)
        .bind(event.product_id)
        .bind(event.publish_link_id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(&event.user_agent)
        .bind(&event.ip_hash)
        .bind(serde_json::Value::Object(event.payload.clone()).to_string())
        .fetch_one(conn)
        .await
    }

    /// Add one to the day's counter, creating the rollup row on first use.
    pub async fn bump_daily(
        conn: &mut PgConnection,
        day: NaiveDate,
        org_id: Uuid,
        product_id: Uuid,
        counter: DailyCounter,
    ) -> Result<(), sqlx::Error> {
        let column = counter.column();
        let sql = format!(
            r#"
            INSERT INTO tbl_analytics_daily_product (day, org_id, product_id, {column})
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (day, org_id, product_id)
            DO UPDATE SET {column} = tbl_analytics_daily_product.{column} + 1
            "#
        );
        sqlx::query(&sql)
            .bind(day)
            .bind(org_id)
            .bind(product_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Organisation a product belongs to.
    pub async fn product_org(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let org: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT org_id FROM tbl_products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(conn)
                .await?;
        Ok(org.flatten())
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    /// Newest draft or processing products of the organisation, with their
    /// newest source image.
    pub async fn resume_products(
        pool: &PgPool,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ResumeRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.status, p.metadata, img.image
            FROM tbl_products p
            LEFT JOIN LATERAL (
                SELECT pa.image
                FROM tbl_product_asset_mapping m
                JOIN tbl_product_assets pa ON pa.id = m.product_asset_id
                WHERE m.productid = p.id AND m.isactive AND pa.asset_id = 1
                ORDER BY m.created_date DESC
                LIMIT 1
            ) img ON TRUE
            WHERE p.org_id = $1 AND p.status IN ('draft', 'processing')
            ORDER BY p.updated_date DESC
            LIMIT $2
            "#,
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ResumeRow {
                id: r.get("id"),
                name: r.get("name"),
                status: r.get("status"),
                metadata: r.try_get_opt("metadata"),
                thumbnail_url: r.try_get_opt("image"),
            })
            .collect())
    }

    /// Product with the most views since `from`.
    pub async fn top_product_since(
        pool: &PgPool,
        org_id: Uuid,
        from: NaiveDate,
    ) -> Result<Option<(String, i64)>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT p.name, COALESCE(SUM(d.views), 0)::BIGINT AS views
            FROM tbl_analytics_daily_product d
            JOIN tbl_products p ON p.id = d.product_id
            WHERE d.org_id = $1 AND d.day >= $2
            GROUP BY p.id, p.name
            ORDER BY views DESC
            LIMIT 1
            "#,
        )
        .bind(org_id)
        .bind(from)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| (r.get("name"), r.get("views"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_bump_daily_accumulates() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let pool = db.pool();
        let org_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        for counter in [DailyCounter::Views, DailyCounter::Views, DailyCounter::Engaged] {
            AnalyticsRepository::bump_daily(&mut conn, today, org_id, product_id, counter)
                .await
                .unwrap();
        }

        let summary = AnalyticsRepository::summary(pool, org_id, Some(product_id), today, today)
            .await
            .unwrap();
        assert_eq!(summary.views, 2);
        assert_eq!(summary.engaged_views, 1);
        assert_eq!(summary.adds_from_3d, 0);

        let series = AnalyticsRepository::daily_views(pool, org_id, None, today, today)
            .await
            .unwrap();
        assert_eq!(series, vec![TimeSeriesPoint { date: today, value: 2 }]);
    }
}
