//! Background removal through an external HTTP API.
//!
//! The API takes a multipart `image` part and answers with the cut-out as PNG.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::BackgroundRemovalConfig;
use crate::error::AppError;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// Reject anything the removal API cannot read.
pub fn ensure_supported(content_type: Option<&str>) -> Result<(), AppError> {
    match content_type {
        Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct) => Ok(()),
        _ => Err(AppError::bad_request(
            "Invalid file type. Allowed: image/png, image/jpeg, image/webp",
        )),
    }
}

pub struct BackgroundRemovalClient {
    url: String,
    api_key: String,
    http: reqwest::Client,
}

impl BackgroundRemovalClient {
    pub fn new(config: &BackgroundRemovalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build background removal HTTP client")?;
        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    /// Returns the PNG bytes of the image without its background.
    pub async fn remove(&self, filename: &str, content_type: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let mut request = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "image/png")
            .multipart(form);
        if !self.api_key.is_empty() {
            request = request.header("X-Api-Key", &self.api_key);
        }

        let resp = request
            .send()
            .await
            .context("Background removal request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Background removal returned {}: {}", status, body);
        }

        let png = resp.bytes().await?.to_vec();
        if png.is_empty() {
            anyhow::bail!("Background removal returned an empty image");
        }
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_types() {
        assert!(ensure_supported(Some("image/png")).is_ok());
        assert!(ensure_supported(Some("image/webp")).is_ok());
        assert!(ensure_supported(Some("image/gif")).is_err());
        assert!(ensure_supported(None).is_err());
    }
}
