use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::types::{AssetPartView, JobStatus};

use crate::db::SafeRow;

#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: Uuid,
    pub image_url: Option<String>,
    pub model_job_id: Option<String>,
    pub asset_id: Option<Uuid>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_date: DateTime<Utc>,
}

const JOB_COLUMNS: &str =
    "id, image_url, model_job_id, asset_id, status, error_message, created_date";

impl JobRow {
    fn from_row(r: &PgRow) -> Self {
        let status: String = r.get("status");
        Self {
            id: r.get("id"),
            image_url: r.try_get_opt("image_url"),
            model_job_id: r.try_get_opt("model_job_id"),
            asset_id: r.try_get_opt("asset_id"),
            status: status.parse().unwrap_or(JobStatus::Queued),
            error_message: r.try_get_opt("error_message"),
            created_date: r.get("created_date"),
        }
    }
}

pub struct JobRepository;

impl JobRepository {
    pub async fn insert(
        conn: &mut PgConnection,
        image_url: &str,
        user_id: Uuid,
    ) -> Result<JobRow, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO tbl_jobs (image_url, status, engine, created_by)
            VALUES ($1, 'queued', 'model-service', $2)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(image_url)
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(JobRow::from_row(&row))
    }

    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM tbl_jobs WHERE id = $1 AND created_by = $2",
            JOB_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.as_ref().map(JobRow::from_row))
    }

    /// Record the provider uid and move the job to `processing`.
    pub async fn mark_processing(
        pool: &PgPool,
        id: Uuid,
        model_job_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tbl_jobs
            SET status = 'processing', model_job_id = $2, updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(model_job_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tbl_jobs
            SET status = 'failed', error_message = $2, updated_date = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }
}

pub struct AssetRepository;

impl AssetRepository {
    pub async fn exists_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tbl_assets WHERE id = $1 AND created_by = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Parts of an asset in the order they were stored.
    pub async fn parts(pool: &PgPool, asset_id: Uuid) -> Result<Vec<AssetPartView>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, part_name, url
            FROM asset_parts
            WHERE asset_id = $1
            ORDER BY created_at ASC, part_name ASC
            "#,
        )
        .bind(asset_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| AssetPartView {
                id: r.get("id"),
                name: r.get("part_name"),
                file_url: r.get("url"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_job_lifecycle() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let pool = db.pool();
        let user_id = Uuid::new_v4();

        let mut conn = pool.acquire().await.unwrap();
        let job = JobRepository::insert(&mut conn, "https://x.test/a.png", user_id)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        JobRepository::mark_processing(pool, job.id, "uid-1").await.unwrap();
        let found = JobRepository::find_owned(pool, job.id, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, JobStatus::Processing);
        assert_eq!(found.model_job_id.as_deref(), Some("uid-1"));

        assert!(
            JobRepository::find_owned(pool, job.id, Uuid::new_v4())
                .await
                .unwrap()
                .is_none()
        );

        JobRepository::mark_failed(pool, job.id, "Inference server error").await.unwrap();
        let failed = JobRepository::find_owned(pool, job.id, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("Inference server error"));
    }
}
