//! Files attached to a product (`tbl_product_assets` + `tbl_product_asset_mapping`)
//! and the viewer payload built from them.

use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::repository::ProductRow;
use super::types::{ASSET_KIND_MESH, ProductAssetsData, ProductImageItem};
use crate::dimension::DimensionService;
use crate::error::AppError;
use crate::gateway::cache;
use crate::product_link::ProductLinkRepository;

/// Active asset of a product with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedAsset {
    pub url: String,
    pub kind_id: i32,
    pub kind_name: String,
}

/// File to attach to a product.
#[derive(Debug, Clone)]
pub struct NewProductAsset<'a> {
    pub product_id: Uuid,
    pub kind: i32,
    pub url: &'a str,
    pub size_bytes: Option<i64>,
    /// Mapping label
    pub name: &'a str,
    pub created_by: Uuid,
}

pub struct ProductAssetRepository;

impl ProductAssetRepository {
    /// Insert the asset row and its mapping; returns the asset id.
    pub async fn attach(
        conn: &mut PgConnection,
        asset: &NewProductAsset<'_>,
    ) -> Result<Uuid, sqlx::Error> {
        let asset_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tbl_product_assets (asset_id, image, size_bytes, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(asset.kind)
        .bind(asset.url)
        .bind(asset.size_bytes)
        .bind(asset.created_by)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tbl_product_asset_mapping
                (name, productid, product_asset_id, isactive, created_by)
            VALUES ($1, $2, $3, TRUE, $4)
            "#,
        )
        .bind(asset.name)
        .bind(asset.product_id)
        .bind(asset_id)
        .bind(asset.created_by)
        .execute(&mut *conn)
        .await?;

        Ok(asset_id)
    }

    /// Active assets, newest first.
    pub async fn list_active(pool: &PgPool, product_id: Uuid) -> Result<Vec<MappedAsset>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT pa.image, a.assetid, a.name
            FROM tbl_product_asset_mapping m
            JOIN tbl_product_assets pa ON pa.id = m.product_asset_id
            JOIN tbl_asset a ON a.assetid = pa.asset_id
            WHERE m.productid = $1 AND m.isactive
            ORDER BY m.created_date DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| MappedAsset {
                url: r.get("image"),
                kind_id: r.get("assetid"),
                kind_name: r.get("name"),
            })
            .collect())
    }
}

/// Newest mesh URL, and every other asset as an image item.
pub fn split_assets(assets: Vec<MappedAsset>) -> (Option<String>, Vec<ProductImageItem>) {
    let mut mesh = None;
    let mut images = Vec::new();
    for asset in assets {
        if asset.kind_id == ASSET_KIND_MESH {
            mesh.get_or_insert(asset.url);
        } else {
            images.push(ProductImageItem {
                url: asset.url,
                kind: asset.kind_name,
            });
        }
    }
    (mesh, images)
}

/// Assemble the viewer payload of a product.
pub async fn assets_view(pool: &PgPool, product: ProductRow) -> Result<ProductAssetsData, AppError> {
    let (meshurl, images) = split_assets(ProductAssetRepository::list_active(pool, product.id).await?);

    let background = match product.background_id {
        Some(id) => cache::load_background_cached(pool.clone(), id)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
        None => None,
    };
    let links = ProductLinkRepository::list_active(pool, product.id).await?;
    let dimensions = DimensionService::keyed_view(pool, product.id).await?;

    Ok(ProductAssetsData {
        id: product.id,
        name: product.name,
        description: product.description,
        price: product.price.map(|p| p as f64),
        currency_type: product.currency_type,
        status: product.status,
        created_at: product.created_date,
        updated_at: product.updated_date,
        meshurl,
        images,
        background,
        links: (!links.is_empty()).then_some(links),
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::types::{ASSET_KIND_BACKGROUND_REMOVED, ASSET_KIND_IMAGE};

    fn asset(url: &str, kind_id: i32, kind_name: &str) -> MappedAsset {
        MappedAsset {
            url: url.into(),
            kind_id,
            kind_name: kind_name.into(),
        }
    }

    #[test]
    fn test_split_assets_takes_newest_mesh() {
        let (mesh, images) = split_assets(vec![
            asset("https://cdn/new.glb", ASSET_KIND_MESH, "mesh"),
            asset("https://cdn/nobg.png", ASSET_KIND_BACKGROUND_REMOVED, "background_removed"),
            asset("https://cdn/old.glb", ASSET_KIND_MESH, "mesh"),
            asset("https://cdn/src.jpg", ASSET_KIND_IMAGE, "image"),
        ]);
        assert_eq!(mesh.as_deref(), Some("https://cdn/new.glb"));
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].kind, "background_removed");
        assert_eq!(images[1].url, "https://cdn/src.jpg");
    }

    #[test]
    fn test_split_assets_without_mesh() {
        let (mesh, images) = split_assets(vec![asset("https://cdn/a.png", 1, "image")]);
        assert!(mesh.is_none());
        let json = serde_json::to_value(&images[0]).unwrap();
        assert_eq!(json["type"], "image");
    }
}
