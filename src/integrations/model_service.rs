//! Client for the image-to-3D inference service.
//!
//! Two backends sit behind [`ModelBackend`]: the HTTP service (`POST {url}/send`,
//! `GET {url}/status/{uid}`) and, with the `mock-api` feature, a local mock
//! selected by a `mock://` URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "mock-api")]
use uuid::Uuid;

use crate::config::ModelServiceConfig;

/// Statuses reported by the service once a model is available.
pub const DONE_STATUSES: [&str; 4] = ["completed", "ready", "finished", "succeeded"];

/// Image handed to the service.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reply of a status call.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Json(Value),
    File {
        bytes: Vec<u8>,
        content_type: String,
    },
    /// Non-2xx answer; still pending or gone.
    Unavailable(u16),
}

impl StatusReply {
    /// JSON and `text/*` bodies are read as JSON, falling back to
    /// `{"raw_response": <text>}`; anything else is the artifact itself.
    pub fn from_body(bytes: Vec<u8>, content_type: String) -> Self {
        let lowered = content_type.to_lowercase();
        if lowered.contains("json") || lowered.starts_with("text/") {
            let value = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| json!({"raw_response": String::from_utf8_lossy(&bytes)}));
            Self::Json(value)
        } else {
            Self::File {
                bytes,
                content_type,
            }
        }
    }

    /// `status`/`state` field, lowercased.
    pub fn state(&self) -> Option<String> {
        match self {
            StatusReply::Json(v) => v
                .get("status")
                .or_else(|| v.get("state"))
                .and_then(Value::as_str)
                .map(str::to_lowercase),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state()
            .is_some_and(|s| DONE_STATUSES.contains(&s.as_str()))
    }

    pub fn download_url(&self) -> Option<&str> {
        match self {
            StatusReply::Json(v) => v
                .get("download_url")
                .or_else(|| v.get("url"))
                .and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Form fields for a product generation request.
pub fn product_generation_fields(target_format: &str, callback_url: &str) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("target_format", target_format.to_string()),
        ("remove_background", "true".to_string()),
        ("mesh_detail", "medium".to_string()),
        ("texture", "true".to_string()),
    ];
    if !callback_url.is_empty() {
        fields.push(("callback_url", callback_url.to_string()));
    }
    fields
}

/// Form fields for a standalone job.
pub fn job_fields() -> Vec<(&'static str, String)> {
    [
        ("texture", "true"),
        ("type", "glb"),
        ("face_count", "10000"),
        ("octree_resolution", "128"),
        ("num_inference_steps", "5"),
        ("guidance_scale", "5.0"),
        ("mc_algo", "mc"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Submit an image; returns the provider uid when one was issued.
    async fn submit(
        &self,
        image: ImagePayload,
        fields: Vec<(&'static str, String)>,
    ) -> Result<Option<String>>;

    async fn status(&self, uid: &str, download: bool) -> Result<StatusReply>;

    /// Fetch a finished artifact.
    async fn download(&self, url: &str) -> Result<(Vec<u8>, String)>;
}

pub struct HttpModelBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpModelBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build model service HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn submit(
        &self,
        image: ImagePayload,
        fields: Vec<(&'static str, String)>,
    ) -> Result<Option<String>> {
        let part = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.filename.clone())
            .mime_str(&image.content_type)
            .context("Invalid image content type")?;
        let mut form = reqwest::multipart::Form::new().part("image", part);
        for (k, v) in fields {
            form = form.text(k, v);
        }

        let url = format!("{}/send", self.base_url);
        tracing::info!(url = %url, filename = %image.filename, "Submitting image to model service");
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .context("Model service request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Model service rejected submission");
            anyhow::bail!("Model service returned {}", status);
        }

        let data: Value = resp.json().await.context("Model service returned non-JSON")?;
        let uid = data.get("uid").and_then(|u| match u {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        if uid.is_none() {
            tracing::warn!(response = %data, "Model service response missing uid");
        }
        Ok(uid)
    }

    async fn status(&self, uid: &str, download: bool) -> Result<StatusReply> {
        let mut url = format!("{}/status/{}", self.base_url, uid);
        if download {
            url.push_str("?download=true");
        }
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Model service status request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(StatusReply::Unavailable(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        Ok(StatusReply::from_body(bytes, content_type))
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Artifact download failed")?
            .error_for_status()?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok((resp.bytes().await?.to_vec(), content_type))
    }
}

/// Local stand-in: every submission succeeds and every status is complete.
#[cfg(feature = "mock-api")]
pub struct MockModelBackend {
    cdn_base_url: String,
}

#[cfg(feature = "mock-api")]
impl MockModelBackend {
    pub fn new(cdn_base_url: &str) -> Self {
        Self {
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(feature = "mock-api")]
#[async_trait]
impl ModelBackend for MockModelBackend {
    async fn submit(
        &self,
        image: ImagePayload,
        _fields: Vec<(&'static str, String)>,
    ) -> Result<Option<String>> {
        tracing::debug!(filename = %image.filename, "Mock model service accepted image");
        Ok(Some(Uuid::new_v4().to_string()))
    }

    async fn status(&self, uid: &str, download: bool) -> Result<StatusReply> {
        let asset_id = Uuid::new_v4();
        let part = |name: &str, file: &str| {
            json!({
                "id": Uuid::new_v4(),
                "name": name,
                "fileURL": format!("{}/assets/{}/{}", self.cdn_base_url, asset_id, file),
            })
        };
        let mut reply = json!({
            "uid": uid,
            "status": "completed",
            "asset_id": asset_id,
            "parts": [part("geometry", "geometry.glb"), part("texture", "texture.jpg")],
        });
        if download {
            reply["download_url"] =
                json!(format!("{}/assets/{}/geometry.glb", self.cdn_base_url, asset_id));
        }
        Ok(StatusReply::Json(reply))
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String)> {
        // glTF binary header with an empty payload
        let mut glb = b"glTF".to_vec();
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&12u32.to_le_bytes());
        tracing::debug!(url, "Mock model artifact served");
        Ok((glb, "model/gltf-binary".to_string()))
    }
}

#[cfg(feature = "mock-api")]
fn mock_backend(cdn_base_url: &str) -> Result<Arc<dyn ModelBackend>> {
    tracing::warn!("Model service running in mock mode");
    Ok(Arc::new(MockModelBackend::new(cdn_base_url)))
}

#[cfg(not(feature = "mock-api"))]
fn mock_backend(_cdn_base_url: &str) -> Result<Arc<dyn ModelBackend>> {
    anyhow::bail!("mock:// model service requires the mock-api feature")
}

/// Shared handle to the configured backend.
#[derive(Clone)]
pub struct ModelServiceClient {
    backend: Arc<dyn ModelBackend>,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub callback_url: String,
}

impl ModelServiceClient {
    pub fn from_config(config: &ModelServiceConfig, cdn_base_url: &str) -> Result<Self> {
        let backend: Arc<dyn ModelBackend> = if config.url.starts_with("mock://") {
            mock_backend(cdn_base_url)?
        } else {
            Arc::new(HttpModelBackend::new(
                &config.url,
                Duration::from_secs(config.timeout_secs),
            )?)
        };

        Ok(Self {
            backend,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_poll_attempts: config.max_poll_attempts,
            callback_url: config.callback_url.clone(),
        })
    }

    pub fn with_backend(backend: Arc<dyn ModelBackend>, poll_interval: Duration, max_poll_attempts: u32) -> Self {
        Self {
            backend,
            poll_interval,
            max_poll_attempts,
            callback_url: String::new(),
        }
    }

    pub async fn submit(
        &self,
        image: ImagePayload,
        fields: Vec<(&'static str, String)>,
    ) -> Result<Option<String>> {
        self.backend.submit(image, fields).await
    }

    pub async fn status(&self, uid: &str, download: bool) -> Result<StatusReply> {
        self.backend.status(uid, download).await
    }

    pub async fn download(&self, url: &str) -> Result<(Vec<u8>, String)> {
        self.backend.download(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reply_done_detection() {
        let reply = StatusReply::Json(json!({"state": "Succeeded", "url": "https://x/y.glb"}));
        assert!(reply.is_done());
        assert_eq!(reply.download_url(), Some("https://x/y.glb"));

        let pending = StatusReply::Json(json!({"status": "processing"}));
        assert!(!pending.is_done());
        assert!(pending.download_url().is_none());

        assert!(!StatusReply::Unavailable(404).is_done());
    }

    #[test]
    fn test_status_body_kinds() {
        let json_body =
            StatusReply::from_body(br#"{"status":"running"}"#.to_vec(), "application/json".into());
        assert_eq!(json_body.state().as_deref(), Some("running"));

        let text_json = StatusReply::from_body(
            br#"{"state":"Completed"}"#.to_vec(),
            "text/plain; charset=utf-8".into(),
        );
        assert_eq!(text_json.state().as_deref(), Some("completed"));

        match StatusReply::from_body(b"queued, try later".to_vec(), "text/html".into()) {
            StatusReply::Json(value) => assert_eq!(value["raw_response"], "queued, try later"),
            other => panic!("expected json, got {:?}", other),
        }

        match StatusReply::from_body(b"glTF".to_vec(), "model/gltf-binary".into()) {
            StatusReply::File { bytes, content_type } => {
                assert_eq!(bytes, b"glTF");
                assert_eq!(content_type, "model/gltf-binary");
            }
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[test]
    fn test_generation_fields() {
        let fields = product_generation_fields("glb", "");
        assert!(fields.iter().any(|(k, v)| *k == "remove_background" && v == "true"));
        assert!(!fields.iter().any(|(k, _)| *k == "callback_url"));

        let with_cb = product_generation_fields("obj", "https://api/cb");
        assert!(with_cb.contains(&("callback_url", "https://api/cb".to_string())));
        assert!(with_cb.contains(&("target_format", "obj".to_string())));
    }

    #[test]
    fn test_job_fields() {
        let fields = job_fields();
        assert!(fields.contains(&("face_count", "10000".to_string())));
        assert!(fields.contains(&("guidance_scale", "5.0".to_string())));
        assert_eq!(fields.len(), 7);
    }

    #[cfg(feature = "mock-api")]
    #[tokio::test]
    async fn test_mock_backend_completes() {
        let client = ModelServiceClient::from_config(
            &ModelServiceConfig::default(),
            "https://cdn.example.com",
        )
        .unwrap();
        let image = ImagePayload {
            filename: "chair.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let uid = client.submit(image, job_fields()).await.unwrap().unwrap();
        let reply = client.status(&uid, false).await.unwrap();
        assert!(reply.is_done());
        let StatusReply::Json(body) = reply else {
            panic!("mock status should be JSON");
        };
        assert_eq!(body["parts"].as_array().unwrap().len(), 2);
        assert!(body["parts"][0]["fileURL"]
            .as_str()
            .unwrap()
            .ends_with("geometry.glb"));
    }
}
