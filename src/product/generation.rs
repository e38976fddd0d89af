//! Image-to-3D product creation (`POST /createProduct`).
//!
//! The quota reservation and the draft commit first; the source image is then
//! stored, recorded as a product asset and handed to the model service. A
//! failed upload removes the draft and returns both reservations, a failed
//! submission returns the AI credit. When the service issues a job uid the
//! product moves to `processing` and a background task polls for the mesh:
//!
//! ```text
//! draft ──submit ok──▶ processing ──mesh stored──▶ ready
//!                          │
//!                          └──attempts exhausted / failure──▶ draft
//! ```

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::assets::{NewProductAsset, ProductAssetRepository};
use super::repository::{NewProduct, ProductMetadata, ProductRepository};
use super::service::product_slug;
use super::types::{ASSET_KIND_IMAGE, ASSET_KIND_MESH, ProductResponse, ProductStatus};
use crate::activity::{ActivityEntry, ActivityService, RequestMeta};
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{MultipartForm, UploadedFile};
use crate::integrations::model_service::product_generation_fields;
use crate::integrations::{ImagePayload, ModelServiceClient, ProductProcessingMessage, StatusReply};
use crate::licensing::{LicensingService, QuotaKind};
use crate::notification::NotificationService;
use crate::organization::OrganizationService;
use crate::storage::product_blob_path;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];
pub const DEFAULT_TARGET_FORMAT: &str = "glb";

// ============================================================================
// Tracker
// ============================================================================

/// Products with a running status poller, keyed to the model job uid.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    jobs: DashMap<Uuid, String>,
}

impl GenerationTracker {
    /// Register a poller; `false` when one is already running for the product.
    pub fn start(&self, product_id: Uuid, uid: &str) -> bool {
        match self.jobs.entry(product_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(uid.to_string());
                true
            }
        }
    }

    pub fn finish(&self, product_id: Uuid) {
        self.jobs.remove(&product_id);
    }

    pub fn job_uid(&self, product_id: Uuid) -> Option<String> {
        self.jobs.get(&product_id).map(|uid| uid.value().clone())
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }
}

// ============================================================================
// Request
// ============================================================================

/// Validated `createProduct` form.
#[derive(Debug)]
pub struct GenerationRequest {
    pub name: String,
    pub image: UploadedFile,
    pub target_format: String,
    /// Asset kind recorded for the source image
    pub asset_id: i32,
    /// Asset kind recorded for the generated mesh
    pub mesh_asset_id: i32,
}

fn parse_kind(form: &MultipartForm, field: &str, default: i32) -> Result<i32, AppError> {
    match form.text(field) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::bad_request(format!("{} must be an integer", field))),
        None => Ok(default),
    }
}

impl GenerationRequest {
    pub fn from_form(mut form: MultipartForm) -> Result<Self, AppError> {
        let name = form
            .text("name")
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("Product name is required"))?;
        if name.chars().count() > 200 {
            return Err(AppError::bad_request("Product name must be at most 200 characters"));
        }

        let target_format = form
            .text("target_format")
            .unwrap_or(DEFAULT_TARGET_FORMAT)
            .to_lowercase();
        if !target_format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::bad_request("Invalid target_format"));
        }
        let asset_id = parse_kind(&form, "asset_id", ASSET_KIND_IMAGE)?;
        let mesh_asset_id = parse_kind(&form, "mesh_asset_id", ASSET_KIND_MESH)?;

        let image = form
            .take_file("image")
            .map_err(|_| AppError::bad_request("Image file is required"))?;
        let allowed = image
            .extension()
            .is_some_and(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(AppError::bad_request(format!(
                "Invalid image format. Allowed formats: {}",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            )));
        }
        if image.bytes.is_empty() {
            return Err(AppError::bad_request("Image file is empty"));
        }

        Ok(Self {
            name,
            image,
            target_format,
            asset_id,
            mesh_asset_id,
        })
    }

    fn content_type(&self) -> String {
        self.image.content_type.clone().unwrap_or_else(|| {
            match self.image.extension().as_deref() {
                Some(".png") => "image/png",
                Some(".webp") => "image/webp",
                Some(".gif") => "image/gif",
                _ => "image/jpeg",
            }
            .to_string()
        })
    }
}

// ============================================================================
// Creation
// ============================================================================

/// Create the product, store its image and start generation.
pub async fn create_product_with_image(
    state: &Arc<AppState>,
    user_id: Uuid,
    req: GenerationRequest,
    meta: &RequestMeta,
) -> Result<ProductResponse, AppError> {
    let storage = state.storage()?;
    let pool = state.pool();
    let org_id = OrganizationService::get_or_create_org_id(pool, user_id, None).await?;
    let content_type = req.content_type();
    let size_bytes = req.image.bytes.len() as i64;

    let mut tx = pool.begin().await?;
    let products =
        LicensingService::reserve_quota(&mut tx, user_id, QuotaKind::Products, 1, None).await?;
    let credits =
        LicensingService::reserve_quota(&mut tx, user_id, QuotaKind::AiCredits, 1, None).await?;
    let slug = product_slug(&mut tx, &req.name, None).await?;
    let product = ProductRepository::insert(
        &mut tx,
        &NewProduct {
            org_id: Some(org_id),
            name: &req.name,
            slug: &slug,
            description: None,
            metadata: &ProductMetadata::default(),
            created_by: user_id,
        },
    )
    .await?;

    tx.commit().await?;

    // The license row is unlocked before any network call.
    let blob_path = product_blob_path(user_id, product.id, &req.image.filename);
    let attached = async {
        let image_url = storage
            .upload_bytes(&blob_path, req.image.bytes.clone(), &content_type)
            .await?;
        let mut tx = pool.begin().await?;
        ProductAssetRepository::attach(
            &mut tx,
            &NewProductAsset {
                product_id: product.id,
                kind: req.asset_id,
                url: &image_url,
                size_bytes: Some(size_bytes),
                name: &req.name,
                created_by: user_id,
            },
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(image_url)
    }
    .await;
    let image_url = match attached {
        Ok(url) => url,
        Err(e) => {
            abandon_product(pool, product.id, user_id).await;
            return Err(e);
        }
    };

    LicensingService::warn_if_near_limit(pool, user_id, products).await;
    LicensingService::warn_if_near_limit(pool, user_id, credits).await;

    let image = ImagePayload {
        filename: req.image.filename.clone(),
        content_type,
        bytes: req.image.bytes,
    };
    let fields =
        product_generation_fields(&req.target_format, &state.model_service.callback_url);
    let uid =
        submit_or_refund(pool, &state.model_service, user_id, product.id, image, fields).await;

    if let Some(bus) = &state.service_bus {
        let message = ProductProcessingMessage {
            product_id: product.id,
            user_id,
            blob_url: image_url.clone(),
            target_format: req.target_format.clone(),
            asset_id: req.asset_id,
            mesh_asset_id: req.mesh_asset_id,
            name: req.name.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        if !bus.publish(&message).await {
            tracing::warn!(product_id = %product.id, "Processing message not published");
        }
    }

    let mut status = product.status;
    if let Some(uid) = uid {
        let mut conn = pool.acquire().await?;
        ProductRepository::set_status(&mut conn, product.id, ProductStatus::Processing).await?;
        status = ProductStatus::Processing;
        spawn_poller(
            state.clone(),
            GenerationJob {
                product_id: product.id,
                user_id,
                name: req.name.clone(),
                target_format: req.target_format.clone(),
                mesh_asset_id: req.mesh_asset_id,
                uid,
            },
        );
    }

    ActivityService::log(
        pool,
        ActivityEntry::product("product.created", user_id, product.id)
            .with_metadata(json!({"source": "image", "status": status.as_str()})),
        meta,
    )
    .await;

    let mut response = ProductResponse::from(product);
    response.status = status;
    response.image_blob_url = Some(image_url);
    Ok(response)
}

/// Submit the stored image. Without a job uid the product stays a draft and
/// the AI credit goes back.
async fn submit_or_refund(
    pool: &PgPool,
    client: &ModelServiceClient,
    user_id: Uuid,
    product_id: Uuid,
    image: ImagePayload,
    fields: Vec<(&'static str, String)>,
) -> Option<String> {
    let uid = match client.submit(image, fields).await {
        Ok(uid) => uid,
        Err(e) => {
            tracing::warn!(%product_id, "Model service submission failed: {:#}", e);
            None
        }
    };
    if uid.is_none() {
        release_or_warn(pool, user_id, QuotaKind::AiCredits, product_id).await;
    }
    uid
}

/// Undo a product whose image never made it to storage.
async fn abandon_product(pool: &PgPool, product_id: Uuid, user_id: Uuid) {
    if let Err(e) = ProductRepository::delete_owned(pool, product_id, user_id).await {
        tracing::error!(%product_id, "Failed to remove abandoned product: {}", e);
    }
    release_or_warn(pool, user_id, QuotaKind::Products, product_id).await;
    release_or_warn(pool, user_id, QuotaKind::AiCredits, product_id).await;
}

async fn release_or_warn(pool: &PgPool, user_id: Uuid, kind: QuotaKind, product_id: Uuid) {
    if let Err(e) = LicensingService::release_quota(pool, user_id, kind, 1).await {
        tracing::warn!(%product_id, quota = kind.usage_key(), "Failed to release quota: {}", e);
    }
}

// ============================================================================
// Poller
// ============================================================================

/// A submitted generation awaiting its mesh.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_format: String,
    pub mesh_asset_id: i32,
    pub uid: String,
}

pub fn spawn_poller(state: Arc<AppState>, job: GenerationJob) {
    if !state.generation.start(job.product_id, &job.uid) {
        tracing::warn!(product_id = %job.product_id, "Generation poller already running");
        return;
    }
    tokio::spawn(async move {
        let product_id = job.product_id;
        poll_and_finalize(&state, &job).await;
        state.generation.finish(product_id);
    });
}

/// Finished artifact for `uid`, if the service has one yet.
pub async fn fetch_result(
    client: &ModelServiceClient,
    uid: &str,
) -> anyhow::Result<Option<(Vec<u8>, String)>> {
    let reply = client.status(uid, true).await?;
    match reply {
        StatusReply::File {
            bytes,
            content_type,
        } => Ok(Some((bytes, content_type))),
        StatusReply::Json(_) if reply.is_done() => match reply.download_url() {
            Some(url) => Ok(Some(client.download(url).await?)),
            None => Ok(None),
        },
        StatusReply::Json(_) => Ok(None),
        StatusReply::Unavailable(code) => {
            tracing::debug!(uid, code, "Model status not available yet");
            Ok(None)
        }
    }
}

async fn poll_and_finalize(state: &AppState, job: &GenerationJob) {
    let client = &state.model_service;
    let mut stored = false;

    for attempt in 1..=client.max_poll_attempts {
        if attempt > 1 {
            tokio::time::sleep(client.poll_interval).await;
        }
        match fetch_result(client, &job.uid).await {
            Ok(Some((bytes, content_type))) => {
                match store_mesh(state, job, bytes, &content_type).await {
                    Ok(()) => stored = true,
                    Err(e) => tracing::error!(
                        product_id = %job.product_id,
                        "Failed to store generated mesh: {:#}",
                        e
                    ),
                }
                break;
            }
            Ok(None) => {
                tracing::info!(product_id = %job.product_id, uid = %job.uid, attempt, "Model not ready")
            }
            Err(e) => tracing::warn!(uid = %job.uid, attempt, "Polling model service failed: {:#}", e),
        }
    }

    if !stored {
        match ProductRepository::transition(
            state.pool(),
            job.product_id,
            ProductStatus::Processing,
            ProductStatus::Draft,
        )
        .await
        {
            Ok(true) => tracing::warn!(product_id = %job.product_id, "Generation gave up; product back to draft"),
            Ok(false) => {}
            Err(e) => tracing::error!(product_id = %job.product_id, "Failed to reset product status: {}", e),
        }
    }
}

async fn store_mesh(
    state: &AppState,
    job: &GenerationJob,
    bytes: Vec<u8>,
    content_type: &str,
) -> anyhow::Result<()> {
    let storage = state
        .blob
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Storage is not configured"))?;
    let pool = state.pool();
    if ProductRepository::find(pool, job.product_id).await?.is_none() {
        tracing::warn!(product_id = %job.product_id, "Product deleted before its mesh arrived");
        return Ok(());
    }
    let size_bytes = bytes.len() as i64;
    let filename = format!("{}.{}", job.uid, job.target_format);
    let path = product_blob_path(job.user_id, job.product_id, &filename);
    let content_type = if content_type.is_empty() {
        "application/octet-stream"
    } else {
        content_type
    };
    let mesh_url = storage.upload_bytes(&path, bytes, content_type).await?;

    let mut tx = pool.begin().await?;
    let mapping = format!("{}_{}", job.name, job.target_format);
    ProductAssetRepository::attach(
        &mut tx,
        &NewProductAsset {
            product_id: job.product_id,
            kind: job.mesh_asset_id,
            url: &mesh_url,
            size_bytes: Some(size_bytes),
            name: &mapping,
            created_by: job.user_id,
        },
    )
    .await?;
    ProductRepository::set_status(&mut tx, job.product_id, ProductStatus::Ready).await?;
    tx.commit().await?;

    tracing::info!(product_id = %job.product_id, mesh = %mesh_url, "Generated mesh stored");
    NotificationService::notify_job_completed(pool, job.user_id, &job.name, &job.uid).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::model_service::ModelBackend;
    use async_trait::async_trait;
    use std::time::Duration;

    fn form(name: Option<&str>, filename: &str) -> MultipartForm {
        let mut form = MultipartForm::default();
        if let Some(name) = name {
            form.fields.insert("name".into(), name.into());
        }
        form.files.insert(
            "image".into(),
            UploadedFile {
                filename: filename.into(),
                content_type: None,
                bytes: vec![0xFF, 0xD8, 0xFF],
            },
        );
        form
    }

    #[test]
    fn test_form_defaults() {
        let req = GenerationRequest::from_form(form(Some("Chair"), "chair.JPG")).unwrap();
        assert_eq!(req.target_format, "glb");
        assert_eq!(req.asset_id, ASSET_KIND_IMAGE);
        assert_eq!(req.mesh_asset_id, ASSET_KIND_MESH);
        assert_eq!(req.content_type(), "image/jpeg");
    }

    #[test]
    fn test_form_rejects_bad_input() {
        let err = GenerationRequest::from_form(form(Some("Chair"), "chair.bmp")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid image format"));
        assert!(GenerationRequest::from_form(form(None, "chair.png")).is_err());

        let mut bad_kind = form(Some("Chair"), "chair.png");
        bad_kind.fields.insert("asset_id".into(), "one".into());
        assert!(GenerationRequest::from_form(bad_kind).is_err());

        let mut no_image = form(Some("Chair"), "chair.png");
        no_image.files.clear();
        let err = GenerationRequest::from_form(no_image).unwrap_err();
        assert_eq!(err.to_string(), "Image file is required");
    }

    #[test]
    fn test_tracker_single_poller_per_product() {
        let tracker = GenerationTracker::default();
        let id = Uuid::new_v4();
        assert!(tracker.start(id, "uid-1"));
        assert!(!tracker.start(id, "uid-2"));
        assert_eq!(tracker.job_uid(id).as_deref(), Some("uid-1"));
        tracker.finish(id);
        assert_eq!(tracker.in_flight(), 0);
    }

    struct PendingThenFile;

    #[async_trait]
    impl ModelBackend for PendingThenFile {
        async fn submit(
            &self,
            _image: ImagePayload,
            _fields: Vec<(&'static str, String)>,
        ) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        async fn status(&self, uid: &str, _download: bool) -> anyhow::Result<StatusReply> {
            Ok(match uid {
                "pending" => StatusReply::Json(json!({"status": "running"})),
                "done-no-url" => StatusReply::Json(json!({"state": "Finished"})),
                "gone" => StatusReply::Unavailable(404),
                _ => StatusReply::File {
                    bytes: b"glTF".to_vec(),
                    content_type: "model/gltf-binary".into(),
                },
            })
        }

        async fn download(&self, _url: &str) -> anyhow::Result<(Vec<u8>, String)> {
            Ok((vec![], String::new()))
        }
    }

    #[tokio::test]
    async fn test_fetch_result_states() {
        let client =
            ModelServiceClient::with_backend(Arc::new(PendingThenFile), Duration::from_millis(1), 1);
        assert!(fetch_result(&client, "pending").await.unwrap().is_none());
        assert!(fetch_result(&client, "done-no-url").await.unwrap().is_none());
        assert!(fetch_result(&client, "gone").await.unwrap().is_none());
        let (bytes, ct) = fetch_result(&client, "file").await.unwrap().unwrap();
        assert_eq!(bytes, b"glTF");
        assert_eq!(ct, "model/gltf-binary");
    }

    // ------------------------------------------------------------------------
    // Reservation bookkeeping (Postgres)
    // ------------------------------------------------------------------------

    /// Free-plan user holding one product and one AI credit, as after the
    /// reservation transaction of `create_product_with_image`.
    async fn reserved_draft(pool: &PgPool) -> (Uuid, Uuid) {
        let user: Uuid = sqlx::query_scalar(
            "INSERT INTO tbl_users (email, name) VALUES ($1, 'Generation Tester') RETURNING id",
        )
        .bind(format!("gen-{}@example.com", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

        let mut tx = pool.begin().await.unwrap();
        LicensingService::create_free_plan_license(&mut tx, user).await.unwrap();
        LicensingService::reserve_quota(&mut tx, user, QuotaKind::Products, 1, None)
            .await
            .unwrap();
        LicensingService::reserve_quota(&mut tx, user, QuotaKind::AiCredits, 1, None)
            .await
            .unwrap();
        let product: Uuid = sqlx::query_scalar(
            "INSERT INTO tbl_products (name, slug, created_by) VALUES ('Chair', $1, $2) RETURNING id",
        )
        .bind(format!("chair-{}", Uuid::new_v4()))
        .bind(user)
        .fetch_one(&mut *tx)
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (user, product)
    }

    async fn usage(pool: &PgPool, user: Uuid, kind: QuotaKind) -> i64 {
        let license = LicensingService::get_active_license(pool, user)
            .await
            .unwrap()
            .unwrap();
        crate::licensing::quota::read_counter(&license.usage, kind.usage_key()).unwrap_or(0)
    }

    fn jpeg() -> ImagePayload {
        ImagePayload {
            filename: "chair.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ModelBackend for Unreachable {
        async fn submit(
            &self,
            _image: ImagePayload,
            _fields: Vec<(&'static str, String)>,
        ) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn status(&self, _uid: &str, _download: bool) -> anyhow::Result<StatusReply> {
            Ok(StatusReply::Unavailable(503))
        }

        async fn download(&self, _url: &str) -> anyhow::Result<(Vec<u8>, String)> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_failed_submission_returns_ai_credit() {
        let db = crate::db::Database::connect(&crate::db::test_database_url()).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool();

        let backends: [Arc<dyn ModelBackend>; 2] = [Arc::new(PendingThenFile), Arc::new(Unreachable)];
        for backend in backends {
            let (user, product) = reserved_draft(pool).await;
            assert_eq!(usage(pool, user, QuotaKind::AiCredits).await, 1);

            let client = ModelServiceClient::with_backend(backend, Duration::from_millis(1), 1);
            let uid = submit_or_refund(pool, &client, user, product, jpeg(), vec![]).await;
            assert!(uid.is_none());

            assert_eq!(usage(pool, user, QuotaKind::AiCredits).await, 0);
            // the draft keeps its product slot
            assert_eq!(usage(pool, user, QuotaKind::Products).await, 1);
        }
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_abandoned_product_returns_both_reservations() {
        let db = crate::db::Database::connect(&crate::db::test_database_url()).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool();
        let (user, product) = reserved_draft(pool).await;

        abandon_product(pool, product, user).await;

        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tbl_products WHERE id = $1")
            .bind(product)
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
        assert_eq!(usage(pool, user, QuotaKind::Products).await, 0);
        assert_eq!(usage(pool, user, QuotaKind::AiCredits).await, 0);
    }
}
