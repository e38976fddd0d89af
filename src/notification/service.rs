use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::{PgPool, Row};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{SafeRow, json_text};
use crate::error::AppError;

pub const JOB_COMPLETED: &str = "job.completed";
pub const QUOTA_WARNING: &str = "quota.warning";

/// Notification as returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    #[schema(value_type = Object)]
    pub data: Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct NotificationService;

impl NotificationService {
    /// Insert a notification unless the user muted its type.
    /// Returns the new id, or `None` when muted.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
        data: Value,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        if Self::is_muted(pool, user_id, kind).await? {
            tracing::debug!(%user_id, kind, "Notification muted by preference");
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO tbl_notifications (user_id, type, title, body, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(data.to_string())
        .fetch_one(pool)
        .await?;

        Ok(Some(row.get("id")))
    }

    async fn is_muted(pool: &PgPool, user_id: Uuid, kind: &str) -> Result<bool, sqlx::Error> {
        let muted: Option<Option<String>> = sqlx::query_scalar(
            "SELECT muted_types FROM tbl_user_notification_prefs WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let muted: Vec<String> = json_text(muted.flatten().as_deref());
        Ok(muted.iter().any(|t| t == kind))
    }

    pub async fn notify_job_completed(
        pool: &PgPool,
        user_id: Uuid,
        product_name: &str,
        job_id: &str,
    ) {
        let body = format!(
            "Your 3D model for '{}' is ready to view and configure.",
            product_name
        );
        let data = json!({"job_id": job_id, "product_name": product_name});
        if let Err(e) =
            Self::create(pool, user_id, JOB_COMPLETED, "3D Model Ready", &body, data).await
        {
            tracing::warn!(%user_id, "Failed to create job notification: {}", e);
        }
    }

    pub async fn notify_quota_warning(
        pool: &PgPool,
        user_id: Uuid,
        quota_type: &str,
        percentage: i64,
    ) {
        let body = quota_warning_body(quota_type, percentage);
        let data = json!({"quota_type": quota_type, "percentage": percentage});
        if let Err(e) = Self::create(pool, user_id, QUOTA_WARNING, "Quota Warning", &body, data).await
        {
            tracing::warn!(%user_id, "Failed to create quota notification: {}", e);
        }
    }

    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationItem>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, title, body, data, read_at, created_at
            FROM tbl_notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let data: Option<String> = r.try_get_opt("data");
                NotificationItem {
                    id: r.get("id"),
                    kind: r.get("type"),
                    title: r.get("title"),
                    body: r.get("body"),
                    data: json_text::<Option<Value>>(data.as_deref())
                        .unwrap_or_else(|| json!({})),
                    read_at: r.try_get_opt("read_at"),
                    created_at: r.get("created_at"),
                }
            })
            .collect())
    }

    pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let res = sqlx::query(
            r#"
            UPDATE tbl_notifications SET read_at = COALESCE(read_at, now())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(AppError::not_found("Notification not found"));
        }
        Ok(())
    }
}

pub fn quota_warning_body(quota_type: &str, percentage: i64) -> String {
    format!("You've used {}% of your {} quota.", percentage, quota_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_warning_body() {
        assert_eq!(
            quota_warning_body("products", 80),
            "You've used 80% of your products quota."
        );
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_unknown_notification_is_not_found() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .expect("connect");
        let err = NotificationService::mark_read(db.pool(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
