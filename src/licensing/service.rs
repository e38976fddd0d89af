use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::quota::{self, QuotaKind};
use crate::error::AppError;
use crate::notification::NotificationService;
use crate::db::SafeRow;

/// Plan codes that unlock galleries.
pub const GALLERY_PLANS: [&str; 2] = ["pro", "enterprise"];

/// Galleries a Pro organisation may own when the license carries no explicit limit.
pub const PRO_GALLERY_LIMIT: i64 = 10;

/// Active license assignment with its decoded JSON columns.
#[derive(Debug, Clone)]
pub struct LicenseAssignment {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub limits: Map<String, Value>,
    pub usage: Map<String, Value>,
    pub created_date: DateTime<Utc>,
}

/// Outcome of a successful reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReservation {
    pub kind: QuotaKind,
    pub used: i64,
    pub limit: Option<i64>,
}

pub struct LicensingService;

impl LicensingService {
    /// Newest active assignment of the user.
    pub async fn get_active_license(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<LicenseAssignment>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, subscription_id, user_id, limits, usage_counters, created_date
            FROM tbl_license_assignments
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|row| {
            let limits: Option<String> = row.try_get_opt("limits");
            let usage: Option<String> = row.try_get_opt("usage_counters");
            LicenseAssignment {
                id: row.get("id"),
                subscription_id: row.get("subscription_id"),
                user_id: row.get("user_id"),
                limits: quota::parse_map(limits.as_deref()),
                usage: quota::parse_map(usage.as_deref()),
                created_date: row.get("created_date"),
            }
        }))
    }

    /// Plan code behind the user's active license, `free` when there is none.
    pub async fn get_user_plan_code(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT p.code
            FROM tbl_license_assignments la
            JOIN tbl_subscriptions s ON s.id = la.subscription_id
            JOIN tbl_mstr_plans p ON p.id = s.plan_id
            WHERE la.user_id = $1 AND la.status = 'active'
            ORDER BY la.created_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(code.unwrap_or_else(|| "free".to_string()))
    }

    pub async fn has_gallery_access(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let code = Self::get_user_plan_code(pool, user_id).await?;
        Ok(GALLERY_PLANS.contains(&code.as_str()))
    }

    /// Check and consume `increment` units of `kind` inside the caller's transaction.
    ///
    /// The assignment row is locked with `FOR UPDATE`, so concurrent reservations for
    /// the same user serialise and the counter commits together with the mutation it
    /// guards. Products and galleries are counted from their tables under the lock;
    /// the other kinds use the stored counters. `fallback_limit` applies when the
    /// license carries no limit for the kind.
    pub async fn reserve_quota(
        conn: &mut PgConnection,
        user_id: Uuid,
        kind: QuotaKind,
        increment: i64,
        fallback_limit: Option<i64>,
    ) -> Result<QuotaReservation, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, limits, usage_counters
            FROM tbl_license_assignments
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_date DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            tracing::info!(%user_id, quota = kind.limit_key(), "No active license; quota denied");
            return Err(AppError::QuotaExceeded {
                message: "No active license. Please subscribe to a plan.".into(),
                details: json!({"quota": kind.limit_key()}),
            });
        };

        let license_id: Uuid = row.get("id");
        let limits_raw: Option<String> = row.try_get_opt("limits");
        let usage_raw: Option<String> = row.try_get_opt("usage_counters");
        let limits = quota::parse_map(limits_raw.as_deref());
        let usage = quota::parse_map(usage_raw.as_deref());

        let limit = quota::read_counter(&limits, kind.limit_key()).or(fallback_limit);
        let current = match kind {
            QuotaKind::Products => count_owned_products(&mut *conn, user_id).await?,
            QuotaKind::Galleries => count_org_galleries(&mut *conn, user_id).await?,
            _ => quota::read_counter(&usage, kind.usage_key()).unwrap_or(0),
        };

        quota::check_quota(kind, limit, current, increment)?;

        let next = quota::bump_usage(&usage, kind, increment);
        sqlx::query(
            r#"
            UPDATE tbl_license_assignments
            SET usage_counters = $2, updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(license_id)
        .bind(Value::Object(next).to_string())
        .execute(&mut *conn)
        .await?;

        Ok(QuotaReservation {
            kind,
            used: current + increment,
            limit,
        })
    }

    /// Give back units after the guarded resource is removed.
    pub async fn release_quota(
        pool: &PgPool,
        user_id: Uuid,
        kind: QuotaKind,
        amount: i64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let row = sqlx::query(
            r#"
            SELECT id, usage_counters
            FROM tbl_license_assignments
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_date DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = row {
            let id: Uuid = row.get("id");
            let usage_raw: Option<String> = row.try_get_opt("usage_counters");
            let usage = quota::parse_map(usage_raw.as_deref());
            let next = quota::bump_usage(&usage, kind, -amount);
            sqlx::query("UPDATE tbl_license_assignments SET usage_counters = $2, updated_date = now() WHERE id = $1")
                .bind(id)
                .bind(Value::Object(next).to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    /// Notify once usage crosses the warning threshold. Call after commit.
    pub async fn warn_if_near_limit(pool: &PgPool, user_id: Uuid, reservation: QuotaReservation) {
        if quota::should_warn(reservation.used, reservation.limit) {
            if let Some(pct) = quota::usage_percentage(reservation.used, reservation.limit) {
                NotificationService::notify_quota_warning(
                    pool,
                    user_id,
                    reservation.kind.label(),
                    pct,
                )
                .await;
            }
        }
    }

    /// Provision the Free plan for a fresh account inside the signup transaction.
    pub async fn create_free_plan_license(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Uuid, sqlx::Error> {
        let default_quotas = json!({
            "max_products": 2,
            "max_ai_credits_month": 5,
            "max_public_views": 1000,
        });

        let plan = sqlx::query(
            r#"
            INSERT INTO tbl_mstr_plans (code, name, quotas)
            VALUES ('free', 'Free', $1)
            ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
            RETURNING id, quotas
            "#,
        )
        .bind(default_quotas.to_string())
        .fetch_one(&mut *conn)
        .await?;
        let plan_id: Uuid = plan.get("id");
        let quotas: Option<String> = plan.try_get_opt("quotas");
        let limits = quota::parse_map(quotas.as_deref());

        let subscription_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tbl_subscriptions (user_id, plan_id, status, seats_purchased, created_by)
            VALUES ($1, $2, 'active', 1, $1)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_one(&mut *conn)
        .await?;

        let license_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tbl_license_assignments
                (subscription_id, user_id, status, limits, usage_counters, created_by)
            VALUES ($1, $2, 'active', $3, '{}', $2)
            RETURNING id
            "#,
        )
        .bind(subscription_id)
        .bind(user_id)
        .bind(Value::Object(limits).to_string())
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(%user_id, %license_id, "Free plan license created");
        Ok(license_id)
    }
}

async fn count_owned_products(conn: &mut PgConnection, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tbl_products WHERE created_by = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await
}

async fn count_org_galleries(conn: &mut PgConnection, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM tbl_galleries g
        JOIN tbl_org_members m ON m.org_id = g.org_id
        WHERE m.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, test_database_url};

    async fn seed_user(pool: &PgPool) -> Uuid {
        sqlx::query_scalar("INSERT INTO tbl_users (email, name) VALUES ($1, 'Quota Tester') RETURNING id")
            .bind(format!("quota-{}@example.com", Uuid::new_v4()))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_free_plan_limits_products() {
        let db = Database::connect(&test_database_url()).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool();
        let user = seed_user(pool).await;

        let mut tx = pool.begin().await.unwrap();
        LicensingService::create_free_plan_license(&mut tx, user).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(LicensingService::get_user_plan_code(pool, user).await.unwrap(), "free");
        assert!(!LicensingService::has_gallery_access(pool, user).await.unwrap());

        for n in 0..2 {
            let mut tx = pool.begin().await.unwrap();
            let r = LicensingService::reserve_quota(&mut tx, user, QuotaKind::Products, 1, None)
                .await
                .unwrap();
            assert_eq!(r.used, n + 1);
            sqlx::query("INSERT INTO tbl_products (name, slug, created_by) VALUES ('p', $1, $2)")
                .bind(format!("p-{}", Uuid::new_v4()))
                .bind(user)
                .execute(&mut *tx)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let mut tx = pool.begin().await.unwrap();
        let err = LicensingService::reserve_quota(&mut tx, user, QuotaKind::Products, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    #[ignore]
    async fn test_no_license_is_denied() {
        let db = Database::connect(&test_database_url()).await.unwrap();
        db.migrate().await.unwrap();
        let user = seed_user(db.pool()).await;

        let mut tx = db.pool().begin().await.unwrap();
        let err = LicensingService::reserve_quota(&mut tx, user, QuotaKind::AiCredits, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_concurrent_reservations_stop_at_limit() {
        let db = Database::connect(&test_database_url()).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();
        let user = seed_user(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        LicensingService::create_free_plan_license(&mut tx, user).await.unwrap();
        tx.commit().await.unwrap();

        let attempts: Vec<_> = (0..12)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let mut tx = pool.begin().await?;
                    LicensingService::reserve_quota(&mut tx, user, QuotaKind::Products, 1, None)
                        .await?;
                    sqlx::query("INSERT INTO tbl_products (name, slug, created_by) VALUES ('p', $1, $2)")
                        .bind(format!("p-{}", Uuid::new_v4()))
                        .bind(user)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok::<_, AppError>(())
                })
            })
            .collect();

        let mut committed = 0;
        let mut denied = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => committed += 1,
                Err(AppError::QuotaExceeded { .. }) => denied += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((committed, denied), (2, 10));

        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tbl_products WHERE created_by = $1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(products, 2);
        let license = LicensingService::get_active_license(&pool, user).await.unwrap().unwrap();
        assert_eq!(quota::read_counter(&license.usage, "products"), Some(2));
    }
}
