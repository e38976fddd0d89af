use sqlx::PgPool;
use uuid::Uuid;

/// Row written for every upload handed out or stored.
#[derive(Debug, Clone, Default)]
pub struct NewUpload<'a> {
    pub filename: &'a str,
    pub upload_url: Option<&'a str>,
    pub file_url: &'a str,
    pub job_id: Option<Uuid>,
    pub model_id: Option<&'a str>,
}

pub struct UploadRepository;

impl UploadRepository {
    pub async fn insert(
        pool: &PgPool,
        user_id: Uuid,
        upload: &NewUpload<'_>,
    ) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO uploads (filename, upload_url, file_url, job_id, model_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(upload.filename)
        .bind(upload.upload_url)
        .bind(upload.file_url)
        .bind(upload.job_id)
        .bind(upload.model_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
