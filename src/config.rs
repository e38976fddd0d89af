use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Apply embedded migrations at startup
    #[serde(default)]
    pub run_migrations: bool,
    pub auth: AuthConfig,
    /// Blob storage; uploads are refused when absent
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub model_service: ModelServiceConfig,
    #[serde(default)]
    pub service_bus: Option<ServiceBusConfig>,
    #[serde(default)]
    pub background_removal: Option<BackgroundRemovalConfig>,
    #[serde(default)]
    pub converter: ConverterConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_expires_minutes: i64,
    #[serde(default = "default_remember_me_days")]
    pub remember_me_days: i64,
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub public_api_username: String,
    #[serde(default)]
    pub public_api_password: String,
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_remember_me_days() -> i64 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub account: String,
    pub key: String,
    #[serde(default = "default_container")]
    pub container: String,
    pub cdn_base_url: String,
    #[serde(default = "default_upload_ttl")]
    pub upload_url_ttl_minutes: i64,
}

fn default_container() -> String {
    "uploads".to_string()
}

fn default_upload_ttl() -> i64 {
    15
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelServiceConfig {
    /// `http(s)://host:port` or `mock://local`
    pub url: String,
    #[serde(default)]
    pub callback_url: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            url: "mock://local".to_string(),
            callback_url: String::new(),
            poll_interval_secs: 30,
            max_poll_attempts: 20,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceBusConfig {
    pub namespace: String,
    pub queue: String,
    pub key_name: String,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackgroundRemovalConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConverterConfig {
    pub command: String,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            command: "usdzip".to_string(),
            timeout_secs: 120,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Secrets are expected from the environment in deployed profiles.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.postgres_url = Some(url);
        }
        if let Some(secret) = non_empty("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(client_id) = non_empty("GOOGLE_CLIENT_ID") {
            self.auth.google_client_id = client_id;
        }
        if let Some(user) = non_empty("PUBLIC_API_USERNAME") {
            self.auth.public_api_username = user;
        }
        if let Some(pass) = non_empty("PUBLIC_API_PASSWORD") {
            self.auth.public_api_password = pass;
        }
        if let Some(storage) = self.storage.as_mut() {
            if let Some(account) = non_empty("AZURE_STORAGE_ACCOUNT") {
                storage.account = account;
            }
            if let Some(key) = non_empty("AZURE_STORAGE_KEY") {
                storage.key = key;
            }
        }
        if let Some(bus) = self.service_bus.as_mut() {
            if let Some(key) = non_empty("SERVICEBUS_KEY") {
                bus.key = key;
            }
        }
        if let Some(removal) = self.background_removal.as_mut() {
            if let Some(key) = non_empty("BACKGROUND_REMOVAL_API_KEY") {
                removal.api_key = key;
            }
        }
    }

    /// Storage section with both an account and a key.
    pub fn storage_ready(&self) -> Option<&StorageConfig> {
        self.storage
            .as_ref()
            .filter(|s| !s.account.is_empty() && !s.key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
log_level: "info"
log_dir: "./logs"
log_file: "api.log"
use_json: false
rotation: "never"
gateway:
  host: "127.0.0.1"
  port: 8000
auth:
  jwt_secret: "file-secret"
storage:
  account: "acct"
  key: ""
  cdn_base_url: "https://cdn.example"
"#;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.auth.access_token_expires_minutes, 60);
        assert_eq!(config.auth.remember_me_days, 30);
        assert_eq!(config.model_service.url, "mock://local");
        assert_eq!(config.model_service.max_poll_attempts, 20);
        assert_eq!(config.converter.command, "usdzip");
        let storage = config.storage.as_ref().unwrap();
        assert_eq!(storage.container, "uploads");
        assert_eq!(storage.upload_url_ttl_minutes, 15);
        assert!(config.service_bus.is_none());
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_env_overrides_replace_secrets() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgresql://u:p@db/rivollo"),
            ("JWT_SECRET", "env-secret"),
            ("AZURE_STORAGE_KEY", "c2VjcmV0"),
            ("GOOGLE_CLIENT_ID", ""),
        ]
        .into_iter()
        .collect();

        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.postgres_url.as_deref(),
            Some("postgresql://u:p@db/rivollo")
        );
        assert_eq!(config.auth.jwt_secret, "env-secret");
        assert_eq!(config.auth.google_client_id, "");
        assert!(config.storage_ready().is_some());
    }

    #[test]
    fn test_storage_without_key_is_not_ready() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.storage_ready().is_none());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(AppConfig::from_yaml("gateway: [").is_err());
    }
}
