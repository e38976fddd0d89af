//! Azure Service Bus queue publisher over the REST API.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::signing::{form_encode, hmac_sha256_base64};
use crate::config::ServiceBusConfig;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_TTL_SECS: i64 = 3600;
const MESSAGE_LABEL: &str = "product-image-processing";

/// Body of a product processing message.
#[derive(Debug, Clone, Serialize)]
pub struct ProductProcessingMessage {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub blob_url: String,
    pub target_format: String,
    pub asset_id: i32,
    pub mesh_asset_id: i32,
    pub name: String,
    pub timestamp: String,
}

/// `SharedAccessSignature sr=..&sig=..&se=..&skn=..` for a resource URI.
pub fn sas_token(resource_uri: &str, key_name: &str, key: &str, expiry: i64) -> Result<String> {
    let encoded_uri = form_encode(resource_uri);
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry);
    let signature = hmac_sha256_base64(key.as_bytes(), &string_to_sign)?;
    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        encoded_uri,
        form_encode(&signature),
        expiry,
        key_name
    ))
}

pub struct ServiceBusPublisher {
    config: ServiceBusConfig,
    http: reqwest::Client,
}

impl ServiceBusPublisher {
    pub fn new(config: ServiceBusConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .context("Failed to build Service Bus HTTP client")?;
        Ok(Self { config, http })
    }

    fn queue_uri(&self) -> String {
        format!(
            "https://{}.servicebus.windows.net/{}",
            self.config.namespace, self.config.queue
        )
    }

    async fn send(&self, payload: &ProductProcessingMessage) -> Result<Uuid> {
        let message_id = Uuid::new_v4();
        let expiry = Utc::now().timestamp() + TOKEN_TTL_SECS;
        let token = sas_token(
            &self.queue_uri(),
            &self.config.key_name,
            &self.config.key,
            expiry,
        )?;
        let broker = json!({"MessageId": message_id, "Label": MESSAGE_LABEL});

        let resp = self
            .http
            .post(format!("{}/messages", self.queue_uri()))
            .header(reqwest::header::AUTHORIZATION, token)
            .header("BrokerProperties", broker.to_string())
            .header("product_id", payload.product_id.to_string())
            .json(payload)
            .send()
            .await
            .context("Service Bus request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Service Bus returned {}: {}", status, body);
        }
        Ok(message_id)
    }

    /// Fire-and-report: failures are logged and returned as `false`.
    pub async fn publish(&self, payload: &ProductProcessingMessage) -> bool {
        match self.send(payload).await {
            Ok(message_id) => {
                tracing::info!(product_id = %payload.product_id, %message_id, "Service Bus message published");
                true
            }
            Err(e) => {
                tracing::error!(product_id = %payload.product_id, "Service Bus publish failed: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sas_token_shape() {
        let token = sas_token(
            "https://ns.servicebus.windows.net/ai-processing-queue",
            "RootManageSharedAccessKey",
            "secret",
            1_700_000_000,
        )
        .unwrap();
        assert!(token.starts_with(
            "SharedAccessSignature sr=https%3A%2F%2Fns.servicebus.windows.net%2Fai-processing-queue&sig="
        ));
        assert!(token.ends_with("&se=1700000000&skn=RootManageSharedAccessKey"));
        // signature must be form-encoded, so no raw '+', '/' or '='
        let sig = token.split("sig=").nth(1).unwrap().split('&').next().unwrap();
        assert!(!sig.contains('/') && !sig.contains('='));
    }

    #[test]
    fn test_message_serializes() {
        let msg = ProductProcessingMessage {
            product_id: Uuid::nil(),
            user_id: Uuid::nil(),
            blob_url: "https://cdn/x.png".into(),
            target_format: "glb".into(),
            asset_id: 1,
            mesh_asset_id: 2,
            name: "Chair".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["mesh_asset_id"], 2);
        assert_eq!(v["target_format"], "glb");
    }
}
