use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::repository::{AssetRepository, JobRepository, JobRow};
use super::types::*;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::integrations::model_service::job_fields;
use crate::integrations::{ImagePayload, StatusReply};
use crate::licensing::{LicensingService, QuotaKind};

const DOWNLOAD_FAILED: &str = "Unable to download imageURL";
const EMPTY_IMAGE: &str = "Downloaded image is empty";
const INFERENCE_FAILED: &str = "Inference server error";
const INFERENCE_NO_UID: &str = "Invalid response from inference server";

struct DownloadedImage {
    bytes: Vec<u8>,
    content_type: Option<String>,
    filename: String,
}

/// Fetch the source image; URLs of our own container are read through the blob API.
async fn download_image(state: &AppState, url: &str) -> anyhow::Result<DownloadedImage> {
    let filename = filename_from_url(url);
    if let Some(storage) = state.blob.as_deref() {
        if let Some(blob_path) = storage.blob_path_of(url) {
            let (bytes, content_type) = storage.download_bytes(&blob_path).await?;
            return Ok(DownloadedImage {
                bytes,
                content_type,
                filename,
            });
        }
    }

    let resp = state.http.get(url).send().await?;
    if resp.status() != reqwest::StatusCode::OK {
        anyhow::bail!("image download returned {}", resp.status());
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Ok(DownloadedImage {
        bytes: resp.bytes().await?.to_vec(),
        content_type,
        filename,
    })
}

pub struct JobService;

impl JobService {
    /// Mark the job failed and hand back the credit it reserved.
    async fn fail(state: &AppState, job: &JobRow, user_id: Uuid, message: &str) {
        if let Err(e) = JobRepository::mark_failed(state.pool(), job.id, message).await {
            tracing::error!(job_id = %job.id, "Failed to mark job as failed: {}", e);
        }
        if let Err(e) =
            LicensingService::release_quota(state.pool(), user_id, QuotaKind::AiCredits, 1).await
        {
            tracing::warn!(job_id = %job.id, "Failed to release AI credit: {}", e);
        }
    }

    /// Download the image, submit it to the model service and record the provider uid.
    pub async fn create(
        state: &AppState,
        user_id: Uuid,
        image_url: &str,
    ) -> Result<JobResponse, AppError> {
        if !image_url.starts_with("http") {
            return Err(AppError::bad_request("Invalid imageURL"));
        }
        tracing::info!(%user_id, image_url, "Create job requested");

        let pool = state.pool();
        let mut tx = pool.begin().await?;
        let reservation =
            LicensingService::reserve_quota(&mut tx, user_id, QuotaKind::AiCredits, 1, None).await?;
        let job = JobRepository::insert(&mut tx, image_url, user_id).await?;
        tx.commit().await?;
        LicensingService::warn_if_near_limit(pool, user_id, reservation).await;

        let image = match download_image(state, image_url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(job_id = %job.id, image_url, "Image download failed: {:#}", e);
                Self::fail(state, &job, user_id, DOWNLOAD_FAILED).await;
                return Err(AppError::bad_request(DOWNLOAD_FAILED));
            }
        };
        if image.bytes.is_empty() {
            tracing::warn!(job_id = %job.id, image_url, "Downloaded image has zero bytes");
            Self::fail(state, &job, user_id, EMPTY_IMAGE).await;
            return Err(AppError::bad_request(EMPTY_IMAGE));
        }

        let payload = ImagePayload {
            content_type: image_content_type(image.content_type.as_deref(), &image.filename),
            filename: image.filename,
            bytes: image.bytes,
        };
        tracing::info!(
            job_id = %job.id,
            filename = %payload.filename,
            content_type = %payload.content_type,
            size_bytes = payload.bytes.len(),
            "Submitting job image"
        );
        let uid = match state.model_service.submit(payload, job_fields()).await {
            Ok(Some(uid)) => uid,
            Ok(None) => {
                Self::fail(state, &job, user_id, INFERENCE_FAILED).await;
                return Err(AppError::BadGateway(INFERENCE_NO_UID.into()));
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, "Model service submission failed: {:#}", e);
                Self::fail(state, &job, user_id, INFERENCE_FAILED).await;
                return Err(AppError::BadGateway(INFERENCE_FAILED.into()));
            }
        };

        JobRepository::mark_processing(pool, job.id, &uid).await?;
        tracing::info!(job_id = %job.id, model_job_id = %uid, %user_id, "Job created");
        Ok(JobResponse {
            id: job.id,
            status: JobStatus::Processing,
            asset_id: None,
        })
    }

    /// Provider status passed through as-is, or the stored job state.
    pub async fn status(state: &AppState, user_id: Uuid, raw_id: &str) -> Result<Response, AppError> {
        let job_id = Uuid::parse_str(raw_id).map_err(|_| AppError::not_found("Job not found"))?;
        let job = JobRepository::find_owned(state.pool(), job_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Job not found"))?;

        if let Some(uid) = job.model_job_id.as_deref() {
            match state.model_service.status(uid, false).await {
                Ok(StatusReply::Json(value)) => return Ok(Json(value).into_response()),
                Ok(StatusReply::File {
                    bytes,
                    content_type,
                }) => {
                    return Ok(Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, content_type)
                        .body(Body::from(bytes))
                        .map_err(|e| AppError::Internal(e.into()))?);
                }
                Ok(StatusReply::Unavailable(code)) => {
                    tracing::warn!(%job_id, code, "Model service status unavailable");
                }
                Err(e) => tracing::warn!(%job_id, "Model service status request failed: {:#}", e),
            }
        }

        Ok(Json(JobStatusView {
            id: job.id,
            status: job.status,
            asset_id: job.asset_id,
            file_url: None,
        })
        .into_response())
    }

    pub async fn asset(state: &AppState, user_id: Uuid, raw_id: &str) -> Result<AssetResponse, AppError> {
        let asset_id = Uuid::parse_str(raw_id).map_err(|_| AppError::not_found("Asset not found"))?;
        if !AssetRepository::exists_owned(state.pool(), asset_id, user_id).await? {
            return Err(AppError::not_found("Asset not found"));
        }
        Ok(AssetResponse {
            id: asset_id,
            parts: AssetRepository::parts(state.pool(), asset_id).await?,
        })
    }
}
