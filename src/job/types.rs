use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Name used when the URL path has no file name.
pub const DEFAULT_IMAGE_NAME: &str = "image.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateJobRequest {
    #[serde(rename = "imageURL")]
    #[validate(length(min = 1, max = 2048))]
    #[schema(example = "https://cdn.example.com/images/chair.png")]
    pub image_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub asset_id: Option<Uuid>,
}

/// Job state answered when the model service has nothing to say.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: Uuid,
    pub status: JobStatus,
    pub asset_id: Option<Uuid>,
    #[serde(rename = "fileURL")]
    pub file_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetPartView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "fileURL")]
    pub file_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub id: Uuid,
    pub parts: Vec<AssetPartView>,
}

/// Last path segment of an image URL.
pub fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string())
}

/// Reported content type, or one guessed from the file name when it is generic.
pub fn image_content_type(reported: Option<&str>, filename: &str) -> String {
    match reported {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => {
            let lower = filename.to_ascii_lowercase();
            let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
            match ext {
                "png" => "image/png",
                "jpg" | "jpeg" => "image/jpeg",
                "webp" => "image/webp",
                "gif" => "image/gif",
                _ => "application/octet-stream",
            }
            .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x.test/a/b/chair.jpg?v=2"), "chair.jpg");
        assert_eq!(filename_from_url("https://x.test/"), DEFAULT_IMAGE_NAME);
        assert_eq!(filename_from_url("not a url"), DEFAULT_IMAGE_NAME);
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Some("image/webp"), "x.png"), "image/webp");
        assert_eq!(image_content_type(Some("application/octet-stream"), "x.PNG"), "image/png");
        assert_eq!(image_content_type(None, "photo.jpeg"), "image/jpeg");
        assert_eq!(image_content_type(None, "blob"), "application/octet-stream");
    }

    #[test]
    fn test_wire_names() {
        let req: CreateJobRequest =
            serde_json::from_str(r#"{"imageURL":"https://x.test/a.png"}"#).unwrap();
        assert_eq!(req.image_url, "https://x.test/a.png");

        let view = JobStatusView {
            id: Uuid::nil(),
            status: JobStatus::Queued,
            asset_id: None,
            file_url: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "queued");
        assert!(json.get("fileURL").is_some());
        assert!(json.get("assetId").is_some());
        assert_eq!("failed".parse::<JobStatus>(), Ok(JobStatus::Failed));
    }
}
