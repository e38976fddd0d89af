use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::repository::{NewUpload, UploadRepository};
use super::upload_blob_path;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, ApiResult, MultipartForm, ValidatedJson, ok};
use crate::integrations::converter::{self, USDZ_CONTENT_TYPE};
use crate::user_auth::CurrentUser;

fn has_extension(filename: &str) -> Result<(), ValidationError> {
    if filename.contains('.') {
        Ok(())
    } else {
        Err(ValidationError::new("filename_extension")
            .with_message("Filename must include an extension".into()))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadInitRequest {
    #[validate(length(min = 1, max = 255), custom(function = "has_extension"))]
    #[schema(example = "chair.png")]
    pub filename: String,
    pub job_id: Option<Uuid>,
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadInitResponse {
    /// Write SAS URL, valid for the configured TTL
    pub upload_url: String,
    pub file_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadContentResponse {
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usdz_url: Option<String>,
    /// Extension to URL, present when more than one format was stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<BTreeMap<String, String>>,
}

/// Signed upload URL
///
/// POST /api/v1/uploads
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    request_body = UploadInitRequest,
    responses(
        (status = 200, description = "Upload target", body = ApiResponse<UploadInitResponse>),
        (status = 400, description = "Invalid filename"),
        (status = 503, description = "Storage is not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<UploadInitRequest>,
) -> ApiResult<UploadInitResponse> {
    let storage = state.storage()?;
    let target = storage.generate_upload_target(&upload_blob_path(user.id, &req.filename))?;

    UploadRepository::insert(
        state.pool(),
        user.id,
        &NewUpload {
            filename: &req.filename,
            upload_url: Some(&target.upload_url),
            file_url: &target.file_url,
            job_id: req.job_id,
            model_id: req.model_id.as_deref(),
        },
    )
    .await?;

    ok(UploadInitResponse {
        upload_url: target.upload_url,
        file_url: target.file_url,
    })
}

/// Upload file content through the API
///
/// POST /api/v1/uploads/content
///
/// A `.glb` is also converted to USDZ; both URLs are returned.
#[utoipa::path(
    post,
    path = "/api/v1/uploads/content",
    request_body(content_type = "multipart/form-data", description = "Form with a `file` part"),
    responses(
        (status = 200, description = "Stored file", body = ApiResponse<UploadContentResponse>),
        (status = 400, description = "Invalid filename"),
        (status = 503, description = "Storage is not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn upload_content(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<UploadContentResponse> {
    let storage = state.storage()?;
    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file("file")?;
    if file.filename.len() > 255 || has_extension(&file.filename).is_err() {
        return Err(AppError::bad_request("Invalid filename"));
    }

    let path = upload_blob_path(user.id, &file.filename);
    let content_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let is_glb = file.extension().as_deref() == Some(".glb") && converter::is_glb(&file.bytes);

    let usdz_url = if is_glb {
        match state.converter.glb_to_usdz(&file.bytes).await {
            Ok((usdz, _)) => {
                let usdz_path = match path.rsplit_once('.') {
                    Some((stem, _)) => format!("{}.usdz", stem),
                    None => format!("{}.usdz", path),
                };
                Some(storage.upload_bytes(&usdz_path, usdz, USDZ_CONTENT_TYPE).await?)
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, "USDZ conversion skipped: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let file_url = storage.upload_bytes(&path, file.bytes, &content_type).await?;
    UploadRepository::insert(
        state.pool(),
        user.id,
        &NewUpload {
            filename: &file.filename,
            file_url: &file_url,
            ..Default::default()
        },
    )
    .await?;

    let formats = usdz_url.as_ref().map(|usdz| {
        BTreeMap::from([
            ("glb".to_string(), file_url.clone()),
            ("usdz".to_string(), usdz.clone()),
        ])
    });
    ok(UploadContentResponse {
        file_url,
        usdz_url,
        formats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_needs_extension() {
        let req = UploadInitRequest {
            filename: "noext".into(),
            job_id: None,
            model_id: None,
        };
        assert!(req.validate().is_err());
        let req = UploadInitRequest {
            filename: "chair.png".into(),
            job_id: None,
            model_id: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_content_response_omits_empty_formats() {
        let json = serde_json::to_value(UploadContentResponse {
            file_url: "https://cdn/a.png".into(),
            usdz_url: None,
            formats: None,
        })
        .unwrap();
        assert_eq!(json["fileUrl"], "https://cdn/a.png");
        assert!(json.get("formats").is_none());
    }
}
