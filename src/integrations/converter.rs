//! GLB to USDZ conversion through an external command line tool.
//!
//! The tool is invoked as `{command} input.glb output.usdz` inside a scratch
//! directory that is removed when the conversion returns.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::process::Command;

use crate::config::ConverterConfig;

pub const USDZ_CONTENT_TYPE: &str = "model/vnd.usdz+zip";

/// Binary glTF starts with the ASCII magic `glTF`.
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[..4] == b"glTF"
}

/// JSON glTF carries an `asset` object at the top level.
pub fn is_gltf(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .is_some_and(|v| v.get("asset").is_some_and(|a| a.is_object()))
}

/// USDZ is an uncompressed zip archive.
pub fn is_usdz(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"PK\x03\x04"
}

pub struct ModelConverter {
    command: String,
    timeout: Duration,
}

impl ModelConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Convert a GLB model, returning the USDZ bytes and their content type.
    pub async fn glb_to_usdz(&self, glb: &[u8]) -> Result<(Vec<u8>, &'static str)> {
        if !is_glb(glb) {
            anyhow::bail!("Input is not a binary glTF file");
        }

        let dir = tempfile::tempdir().context("Failed to create conversion directory")?;
        let input = dir.path().join("input.glb");
        let output = dir.path().join("output.usdz");
        tokio::fs::write(&input, glb)
            .await
            .context("Failed to write conversion input")?;

        let run = Command::new(&self.command)
            .arg(&input)
            .arg(&output)
            .kill_on_drop(true)
            .output();
        let result = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow::anyhow!("{} conversion timed out", self.command))?
            .with_context(|| format!("Failed to run {}", self.command))?;

        if !result.status.success() {
            anyhow::bail!(
                "{} failed: {}",
                self.command,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let usdz = tokio::fs::read(&output)
            .await
            .with_context(|| format!("{} did not produce an output file", self.command))?;
        tracing::info!(input = glb.len(), output = usdz.len(), "Converted GLB to USDZ");
        Ok((usdz, USDZ_CONTENT_TYPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glb_header() -> Vec<u8> {
        let mut bytes = b"glTF".to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_format_sniffing() {
        assert!(is_glb(&glb_header()));
        assert!(!is_glb(b"glTF"));
        assert!(is_gltf(br#"{"asset":{"version":"2.0"}}"#));
        assert!(!is_gltf(br#"{"scenes":[]}"#));
        assert!(is_usdz(b"PK\x03\x04rest"));
        assert!(!is_usdz(&glb_header()));
    }

    #[tokio::test]
    async fn test_rejects_non_glb_input() {
        let converter = ModelConverter::new(&ConverterConfig::default());
        assert!(converter.glb_to_usdz(b"not a model").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_tool_is_an_error() {
        let converter = ModelConverter::new(&ConverterConfig {
            command: "definitely-not-installed-usd-tool".into(),
            timeout_secs: 5,
        });
        assert!(converter.glb_to_usdz(&glb_header()).await.is_err());
    }
}
