use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::assets::{NewProductAsset, ProductAssetRepository};
use super::repository::ProductRepository;
use super::types::ASSET_KIND_BACKGROUND_REMOVED;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::UploadedFile;
use crate::integrations::background_removal::ensure_supported;

#[derive(Debug, Serialize, ToSchema)]
pub struct BackgroundRemovalResponse {
    /// Asset kind of the stored cut-out
    pub asset_id: i32,
    pub blob_url: String,
    pub message: String,
    pub image_size_bytes: i64,
}

/// `{product_id}/{hex}.png`
pub fn cutout_blob_path(product_id: Uuid) -> String {
    format!("{}/{}.png", product_id, Uuid::new_v4().simple())
}

/// Strip the background of `image` and attach the PNG to the product.
pub async fn remove_background(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
    image: UploadedFile,
) -> Result<BackgroundRemovalResponse, AppError> {
    ensure_supported(image.content_type.as_deref())?;
    let client = state.background_removal.as_deref().ok_or_else(|| {
        AppError::ServiceUnavailable("Background removal is not configured".into())
    })?;
    let storage = state.storage()?;
    let pool = state.pool();

    if !ProductRepository::exists_owned(pool, product_id, user_id).await? {
        return Err(AppError::not_found("Product not found."));
    }
    if image.bytes.is_empty() {
        return Err(AppError::bad_request("Failed to read image: empty file"));
    }

    let content_type = image.content_type.as_deref().unwrap_or("image/png");
    let png = client
        .remove(&image.filename, content_type, image.bytes)
        .await
        .map_err(|e| {
            tracing::error!(%product_id, "Background removal failed: {:#}", e);
            AppError::BadGateway("Background removal failed".into())
        })?;
    let size = png.len() as i64;
    let blob_url = storage
        .upload_bytes(&cutout_blob_path(product_id), png, "image/png")
        .await?;

    let mapping_name = if image.filename.is_empty() {
        "Processed Image"
    } else {
        image.filename.as_str()
    };
    let mut tx = pool.begin().await?;
    ProductAssetRepository::attach(
        &mut tx,
        &NewProductAsset {
            product_id,
            kind: ASSET_KIND_BACKGROUND_REMOVED,
            url: &blob_url,
            size_bytes: Some(size),
            name: mapping_name,
            created_by: user_id,
        },
    )
    .await?;
    tx.commit().await?;
    tracing::info!(%product_id, size, "Background removed");

    Ok(BackgroundRemovalResponse {
        asset_id: ASSET_KIND_BACKGROUND_REMOVED,
        blob_url,
        message: "Background removed and saved successfully".into(),
        image_size_bytes: size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutout_blob_path() {
        let id = Uuid::new_v4();
        let path = cutout_blob_path(id);
        let (dir, file) = path.split_once('/').unwrap();
        assert_eq!(dir, id.to_string());
        assert!(file.ends_with(".png"));
        assert_eq!(file.len(), 32 + 4);
    }
}
