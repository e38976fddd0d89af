use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::AppError;
use crate::integrations::{
    BackgroundRemovalClient, ModelConverter, ModelServiceClient, ServiceBusPublisher,
};
use crate::product::generation::GenerationTracker;
use crate::storage::BlobStorage;
use crate::user_auth::{AuthService, GoogleVerifier};

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// PostgreSQL pool
    pub db: Arc<Database>,
    /// Password hashing and JWT issuance
    pub auth: Arc<AuthService>,
    pub google: Arc<GoogleVerifier>,
    /// Image-to-3D inference service
    pub model_service: ModelServiceClient,
    /// Optional: generation messages are skipped when absent
    pub service_bus: Option<Arc<ServiceBusPublisher>>,
    /// Optional: upload endpoints answer 503 when absent
    pub blob: Option<Arc<BlobStorage>>,
    pub background_removal: Option<Arc<BackgroundRemovalClient>>,
    pub converter: Arc<ModelConverter>,
    /// Products with a running status poller
    pub generation: Arc<GenerationTracker>,
    /// Outbound client for downloading user supplied URLs
    pub http: reqwest::Client,
}

impl AppState {
    /// Build every service from the configuration.
    pub fn from_config(config: AppConfig, db: Arc<Database>) -> anyhow::Result<Self> {
        let blob = match config.storage_ready() {
            Some(storage) => Some(Arc::new(BlobStorage::new(storage)?)),
            None => {
                tracing::warn!("Blob storage not configured; uploads are disabled");
                None
            }
        };
        let cdn_base_url = config
            .storage
            .as_ref()
            .map(|s| s.cdn_base_url.clone())
            .unwrap_or_default();

        let model_service = ModelServiceClient::from_config(&config.model_service, &cdn_base_url)?;
        let service_bus = config
            .service_bus
            .clone()
            .filter(|bus| !bus.key.is_empty())
            .map(ServiceBusPublisher::new)
            .transpose()?
            .map(Arc::new);
        let background_removal = config
            .background_removal
            .as_ref()
            .map(BackgroundRemovalClient::new)
            .transpose()?
            .map(Arc::new);

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            auth: Arc::new(AuthService::new(&config.auth)),
            google: Arc::new(GoogleVerifier::new(config.auth.google_client_id.clone())),
            converter: Arc::new(ModelConverter::new(&config.converter)),
            generation: Arc::new(GenerationTracker::default()),
            model_service,
            service_bus,
            blob,
            background_removal,
            http,
            db,
            config: Arc::new(config),
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    /// Blob storage, or 503 when the deployment has none.
    pub fn storage(&self) -> Result<&BlobStorage, AppError> {
        self.blob
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable("Storage is not configured".into()))
    }
}
