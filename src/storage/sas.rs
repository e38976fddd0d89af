//! Azure Blob Storage access through service SAS URLs.
//!
//! Uploads are signed locally with the account key; nothing here needs the
//! Azure SDK. Public links go through the configured CDN base.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::integrations::signing::hmac_sha256_base64;

const SAS_VERSION: &str = "2020-12-06";
const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Write permissions handed to browsers for direct uploads.
const WRITE_PERMISSIONS: &str = "cw";

/// Fields of a blob service SAS.
#[derive(Debug, Clone)]
pub struct SasParams<'a> {
    pub permissions: &'a str,
    pub start: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    pub account: &'a str,
    pub container: &'a str,
    pub blob: &'a str,
}

impl SasParams<'_> {
    /// String-to-sign for service SAS version 2020-12-06.
    pub fn string_to_sign(&self) -> String {
        let canonical = format!("/blob/{}/{}/{}", self.account, self.container, self.blob);
        [
            self.permissions,
            &self.start.format(SAS_TIME_FORMAT).to_string(),
            &self.expiry.format(SAS_TIME_FORMAT).to_string(),
            &canonical,
            "", // signed identifier
            "", // signed ip
            "https",
            SAS_VERSION,
            "b",
            "", // snapshot time
            "", // encryption scope
            "", // rscc
            "", // rscd
            "", // rsce
            "", // rscl
            "", // rsct
        ]
        .join("\n")
    }
}

/// Replace characters outside `[A-Za-z0-9._-]` and drop any directory part.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `users/{user}/uploads/{uuid}/{filename}`
pub fn upload_blob_path(user_id: Uuid, filename: &str) -> String {
    format!(
        "users/{}/uploads/{}/{}",
        user_id,
        Uuid::new_v4(),
        sanitize_filename(filename)
    )
}

/// `users/{user}/products/{product}/{filename}`
pub fn product_blob_path(user_id: Uuid, product_id: Uuid, filename: &str) -> String {
    format!(
        "users/{}/products/{}/{}",
        user_id,
        product_id,
        sanitize_filename(filename)
    )
}

/// Signed URL pair for a direct browser upload.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub upload_url: String,
    pub file_url: String,
}

pub struct BlobStorage {
    account: String,
    key: Vec<u8>,
    container: String,
    cdn_base_url: String,
    upload_ttl: Duration,
    http: reqwest::Client,
}

impl BlobStorage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let key = STANDARD
            .decode(config.key.trim())
            .context("Storage account key is not valid base64")?;
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(120))
            .build()
            .context("Failed to build storage HTTP client")?;
        Ok(Self {
            account: config.account.clone(),
            key,
            container: config.container.clone(),
            cdn_base_url: config.cdn_base_url.trim_end_matches('/').to_string(),
            upload_ttl: Duration::minutes(config.upload_url_ttl_minutes),
            http,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Public (CDN) URL of a blob.
    pub fn public_url(&self, blob_path: &str) -> String {
        if self.cdn_base_url.is_empty() {
            return self.blob_url(blob_path);
        }
        format!("{}/{}", self.cdn_base_url, blob_path)
    }

    pub fn blob_url(&self, blob_path: &str) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}/{}",
            self.account, self.container, blob_path
        )
    }

    /// Blob path behind a CDN or blob URL of this container, if it is one.
    pub fn blob_path_of(&self, url: &str) -> Option<String> {
        let blob_prefix = format!("{}/", self.blob_url("").trim_end_matches('/'));
        let cdn_prefix = format!("{}/", self.cdn_base_url);
        url.strip_prefix(&blob_prefix)
            .or_else(|| (!self.cdn_base_url.is_empty()).then(|| url.strip_prefix(&cdn_prefix)).flatten())
            .map(|p| p.split('?').next().unwrap_or(p).to_string())
    }

    fn signed_url(&self, blob_path: &str, permissions: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let params = SasParams {
            permissions,
            start: now - Duration::minutes(5),
            expiry: now + ttl,
            account: &self.account,
            container: &self.container,
            blob: blob_path,
        };
        let signature = hmac_sha256_base64(&self.key, &params.string_to_sign())?;

        let mut url = reqwest::Url::parse(&self.blob_url(blob_path))
            .with_context(|| format!("Invalid blob path: {}", blob_path))?;
        url.query_pairs_mut()
            .append_pair("sv", SAS_VERSION)
            .append_pair("sp", permissions)
            .append_pair("st", &params.start.format(SAS_TIME_FORMAT).to_string())
            .append_pair("se", &params.expiry.format(SAS_TIME_FORMAT).to_string())
            .append_pair("spr", "https")
            .append_pair("sr", "b")
            .append_pair("sig", &signature);
        Ok(url.to_string())
    }

    /// Write SAS for a browser upload plus the public URL the file will have.
    pub fn generate_upload_target(&self, blob_path: &str) -> Result<UploadTarget> {
        Ok(UploadTarget {
            upload_url: self.signed_url(blob_path, WRITE_PERMISSIONS, self.upload_ttl)?,
            file_url: self.public_url(blob_path),
        })
    }

    /// Store bytes as a block blob and return its public URL.
    pub async fn upload_bytes(
        &self,
        blob_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let size = bytes.len();
        let url = self.signed_url(blob_path, WRITE_PERMISSIONS, Duration::minutes(15))?;
        let resp = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("Blob upload request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Blob upload rejected with {}: {}", status, body);
        }
        tracing::info!(blob = blob_path, size, "Blob uploaded");
        Ok(self.public_url(blob_path))
    }

    /// Read a blob of this container through a short-lived read SAS.
    pub async fn download_bytes(&self, blob_path: &str) -> Result<(Vec<u8>, Option<String>)> {
        let url = self.signed_url(blob_path, "r", Duration::minutes(5))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Blob download request failed")?
            .error_for_status()
            .context("Blob download rejected")?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((resp.bytes().await?.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> BlobStorage {
        BlobStorage::new(&StorageConfig {
            account: "rivollo".into(),
            key: STANDARD.encode(b"account-key"),
            container: "uploads".into(),
            cdn_base_url: "https://cdn.example.com/uploads/".into(),
            upload_url_ttl_minutes: 15,
        })
        .unwrap()
    }

    #[test]
    fn test_string_to_sign_layout() {
        let t = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let params = SasParams {
            permissions: "cw",
            start: t,
            expiry: t + Duration::minutes(15),
            account: "acct",
            container: "uploads",
            blob: "users/u/file.png",
        };
        let s = params.string_to_sign();
        let lines: Vec<&str> = s.split('\n').collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "cw");
        assert_eq!(lines[1], "2024-01-02T03:04:05Z");
        assert_eq!(lines[2], "2024-01-02T03:19:05Z");
        assert_eq!(lines[3], "/blob/acct/uploads/users/u/file.png");
        assert_eq!(lines[7], SAS_VERSION);
        assert_eq!(lines[8], "b");
    }

    #[test]
    fn test_upload_target() {
        let s = storage();
        let target = s.generate_upload_target("users/u/uploads/x/a.png").unwrap();
        assert_eq!(target.file_url, "https://cdn.example.com/uploads/users/u/uploads/x/a.png");
        assert!(target.upload_url.starts_with(
            "https://rivollo.blob.core.windows.net/uploads/users/u/uploads/x/a.png?"
        ));
        assert!(target.upload_url.contains("sp=cw"));
        assert!(target.upload_url.contains("sig="));
    }

    #[test]
    fn test_blob_path_of() {
        let s = storage();
        assert_eq!(
            s.blob_path_of("https://cdn.example.com/uploads/users/a/b.png").as_deref(),
            Some("users/a/b.png")
        );
        assert_eq!(
            s.blob_path_of("https://rivollo.blob.core.windows.net/uploads/p/x.glb?sig=1").as_deref(),
            Some("p/x.glb")
        );
        assert!(s.blob_path_of("https://elsewhere.com/a.png").is_none());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).PNG"), "my_photo__1_.PNG");
        assert_eq!(sanitize_filename("   "), "file");
    }

    #[test]
    fn test_blob_paths() {
        let user = Uuid::new_v4();
        let product = Uuid::new_v4();
        assert!(upload_blob_path(user, "a.png").starts_with(&format!("users/{}/uploads/", user)));
        assert_eq!(
            product_blob_path(user, product, "img.jpg"),
            format!("users/{}/products/{}/img.jpg", user, product)
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let result = BlobStorage::new(&StorageConfig {
            account: "a".into(),
            key: "not base64!!".into(),
            container: "c".into(),
            cdn_base_url: String::new(),
            upload_url_ttl_minutes: 15,
        });
        assert!(result.is_err());
    }
}
