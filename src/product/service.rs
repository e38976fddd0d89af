use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::assets::assets_view;
use super::reference::ReferenceRepository;
use super::repository::{NewProduct, ProductFilter, ProductMetadata, ProductRepository, ProductRow};
use super::types::*;
use crate::activity::{ActivityEntry, ActivityService, RequestMeta};
use crate::error::AppError;
use crate::gateway::cache;
use crate::gateway::types::{PageMeta, Paged, page_window};
use crate::licensing::{LicensingService, QuotaKind};
use crate::organization::OrganizationService;
use crate::product_link::{ProductLinkRepository, ProductLinkService};
use crate::slug::{lock_slug_family, slugify, unique_slug};

pub const INVALID_PRODUCT_ID: &str = "Invalid productId format. Expected UUID string.";

/// Length of the public id of a publish link.
const PUBLIC_ID_LEN: usize = 16;

impl From<ProductRow> for ProductResponse {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            brand: row.metadata.brand,
            accent_color: row
                .metadata
                .accent_color
                .unwrap_or_else(|| DEFAULT_ACCENT_COLOR.to_string()),
            accent_overlay: row.metadata.accent_overlay,
            tags: row.metadata.tags,
            status: row.status,
            created_at: row.created_date,
            updated_at: row.updated_date,
            configurator: None,
            background: None,
            links: None,
            image_blob_url: None,
        }
    }
}

/// Apply an edit. `replace` clears every optional field the update leaves out.
/// Returns whether the name changed.
pub fn apply_update(row: &mut ProductRow, update: ProductUpdate, replace: bool) -> bool {
    fn set<T>(slot: &mut Option<T>, value: Option<T>, replace: bool) {
        if replace || value.is_some() {
            *slot = value;
        }
    }

    let renamed = match update.name {
        Some(name) if name != row.name => {
            row.name = name;
            true
        }
        _ => false,
    };
    set(&mut row.description, update.description, replace);
    set(&mut row.metadata.brand, update.brand, replace);
    set(&mut row.metadata.accent_color, update.accent_color, replace);
    set(&mut row.metadata.accent_overlay, update.accent_overlay, replace);
    match update.tags {
        Some(tags) => row.metadata.tags = tags,
        None if replace => row.metadata.tags.clear(),
        None => {}
    }
    renamed
}

/// Stored price: whole units, fraction dropped.
pub fn stored_price(price: Decimal) -> Option<i64> {
    price.trunc().to_i64()
}

fn public_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_ID_LEN)
        .map(char::from)
        .collect()
}

/// Unique slug for `name`, ignoring the product being renamed.
///
/// `conn` must be inside the transaction that inserts or renames the product.
pub async fn product_slug(
    conn: &mut PgConnection,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<String, sqlx::Error> {
    let base = slugify(name);
    let base = if base.is_empty() { "product".to_string() } else { base };
    // slugs are unique across every user
    lock_slug_family(conn, "product", &base).await?;
    let taken = ProductRepository::taken_slugs(conn, &base, exclude).await?;
    Ok(unique_slug(&base, &taken))
}

pub struct ProductService;

impl ProductService {
    async fn owned(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<ProductRow, AppError> {
        ProductRepository::find_owned(pool, product_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))
    }

    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        query: &ProductListQuery,
    ) -> Result<Paged<ProductResponse>, AppError> {
        let window = page_window(query.page, query.page_size)?;
        let filter = ProductFilter {
            q: query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()),
            status: query.status,
            order_by: order_clause(query.sort.as_deref()),
            limit: window.page_size,
            offset: window.offset,
        };
        let (rows, total) = ProductRepository::list_owned(pool, user_id, &filter).await?;
        Ok(Paged {
            items: rows.into_iter().map(ProductResponse::from).collect(),
            meta: PageMeta::new(window.page, window.page_size, total),
        })
    }

    /// Create a draft product, consuming one unit of the product quota.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        req: ProductCreate,
        meta: &RequestMeta,
    ) -> Result<ProductResponse, AppError> {
        let org_id = OrganizationService::get_or_create_org_id(pool, user_id, None).await?;
        let metadata = ProductMetadata {
            brand: req.brand,
            accent_color: req.accent_color,
            accent_overlay: req.accent_overlay,
            tags: req.tags.unwrap_or_default(),
        };

        let mut tx = pool.begin().await?;
        let reservation =
            LicensingService::reserve_quota(&mut tx, user_id, QuotaKind::Products, 1, None).await?;
        let slug = product_slug(&mut tx, &req.name, None).await?;
        let product = ProductRepository::insert(
            &mut tx,
            &NewProduct {
                org_id: Some(org_id),
                name: &req.name,
                slug: &slug,
                description: req.description.as_deref(),
                metadata: &metadata,
                created_by: user_id,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, %user_id, "Product created");
        LicensingService::warn_if_near_limit(pool, user_id, reservation).await;
        ActivityService::log(pool, ActivityEntry::product("product.created", user_id, product.id), meta)
            .await;
        Ok(product.into())
    }

    /// Product with configurator, background and active links.
    pub async fn get(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<ProductResponse, AppError> {
        let product = Self::owned(pool, product_id, user_id).await?;
        let configurator = ProductRepository::configurator(pool, product.id).await?;
        let background = match product.background_id {
            Some(id) => cache::load_background_cached(pool.clone(), id)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
            None => None,
        };
        let links = ProductLinkRepository::list_active(pool, product.id).await?;

        let mut response = ProductResponse::from(product);
        response.configurator = configurator;
        response.background = background;
        response.links = (!links.is_empty()).then_some(links);
        Ok(response)
    }

    /// `PATCH` (partial) or `PUT` (`replace`) of the presentation fields.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        update: ProductUpdate,
        replace: bool,
        meta: &RequestMeta,
    ) -> Result<ProductResponse, AppError> {
        let mut product = Self::owned(pool, product_id, user_id).await?;
        let mut tx = pool.begin().await?;
        if apply_update(&mut product, update, replace) {
            product.slug = product_slug(&mut tx, &product.name, Some(product.id)).await?;
        }
        let saved = ProductRepository::save(&mut tx, &product, user_id).await?;
        tx.commit().await?;

        ActivityService::log(
            pool,
            ActivityEntry::product("product.updated", user_id, product_id)
                .with_metadata(json!({"replace": replace})),
            meta,
        )
        .await;
        Ok(saved.into())
    }

    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<(), AppError> {
        if !ProductRepository::delete_owned(pool, product_id, user_id).await? {
            return Err(AppError::not_found("Product not found"));
        }
        tracing::info!(%product_id, %user_id, "Product deleted");
        ActivityService::log(pool, ActivityEntry::product("product.deleted", user_id, product_id), meta)
            .await;
        Ok(())
    }

    /// Merge `patch` into the stored configurator settings.
    pub async fn update_configurator(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        patch: ConfiguratorSettings,
    ) -> Result<ConfiguratorSettings, AppError> {
        let product = Self::owned(pool, product_id, user_id).await?;
        let mut settings = ProductRepository::configurator(pool, product.id)
            .await?
            .unwrap_or_default();
        settings.merge(patch);

        let mut tx = pool.begin().await?;
        ProductRepository::upsert_configurator(&mut tx, product.id, user_id, &settings).await?;
        tx.commit().await?;
        Ok(settings)
    }

    pub async fn publish(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        publish: bool,
        meta: &RequestMeta,
    ) -> Result<PublishResponse, AppError> {
        let product = Self::owned(pool, product_id, user_id).await?;
        let mut tx = pool.begin().await?;

        let action = if publish {
            if !product.status.can_publish() {
                return Err(AppError::Conflict(
                    "Product must have a completed 3D model before publishing".into(),
                ));
            }
            ProductRepository::set_status(&mut tx, product.id, ProductStatus::Published).await?;
            let public_id =
                ProductRepository::enable_publish_link(&mut tx, product.id, &public_id()).await?;
            tracing::info!(%product_id, %public_id, "Product published");
            "product.published"
        } else {
            ProductRepository::set_status(&mut tx, product.id, ProductStatus::Unpublished).await?;
            ProductRepository::disable_publish_link(&mut tx, product.id).await?;
            tracing::info!(%product_id, "Product unpublished");
            "product.unpublished"
        };
        tx.commit().await?;

        ActivityService::log(pool, ActivityEntry::product(action, user_id, product_id), meta).await;
        Ok(PublishResponse {
            published: publish,
            published_at: publish.then(chrono::Utc::now),
        })
    }

    /// Commerce details; `links` replaces the active link set.
    pub async fn update_details(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        req: ProductDetailsUpdate,
    ) -> Result<ProductDetailsResponse, AppError> {
        let mut product = ProductRepository::find_owned(pool, product_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found."))?;

        if let Some(currency) = req.currency_type {
            if !ReferenceRepository::currency_exists(pool, currency).await? {
                return Err(AppError::not_found(format!(
                    "Currency type with ID {} not found.",
                    currency
                )));
            }
            product.currency_type = Some(currency);
        }
        if let Some(background) = req.backgroundid {
            if !ReferenceRepository::background_exists(pool, background).await? {
                return Err(AppError::not_found(format!(
                    "Background with ID {} not found.",
                    background
                )));
            }
            product.background_id = Some(background);
        }
        if let Some(price) = req.price {
            product.price = stored_price(price);
        }
        if let Some(description) = req.description {
            product.description = Some(description);
        }

        let mut tx = pool.begin().await?;
        if let Some(name) = req.name.filter(|n| *n != product.name) {
            product.slug = product_slug(&mut tx, &name, Some(product.id)).await?;
            product.name = name;
        }
        let saved = ProductRepository::save(&mut tx, &product, user_id).await?;
        if let Some(links) = &req.links {
            ProductLinkService::replace_links(&mut tx, product.id, user_id, links).await?;
        }
        tx.commit().await?;
        tracing::info!(%product_id, "Product details updated");

        let background = match saved.background_id {
            Some(id) => ReferenceRepository::background(pool, id).await?,
            None => None,
        };
        let links = ProductLinkRepository::list_active(pool, saved.id).await?;
        Ok(ProductDetailsResponse {
            id: saved.id,
            name: saved.name,
            description: saved.description,
            price: saved.price.map(|p| p as f64),
            currency_type: saved.currency_type,
            background_type: background.as_ref().and_then(|b| b.background_type_id),
            backgroundid: saved.background_id,
            status: saved.status,
            created_at: saved.created_date,
            updated_at: saved.updated_date,
            background,
            links: (!links.is_empty()).then_some(links),
        })
    }

    pub async fn assets(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductAssetsData, AppError> {
        let product = ProductRepository::find_owned(pool, product_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found."))?;
        assets_view(pool, product).await
    }

    /// Viewer payload for embeds behind HTTP Basic.
    pub async fn public_assets(pool: &PgPool, product_id: Uuid) -> Result<ProductAssetsData, AppError> {
        let product = ProductRepository::find(pool, product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found."))?;
        assets_view(pool, product).await
    }

    pub async fn status(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductStatusView, AppError> {
        let product = ProductRepository::find_owned(pool, product_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found."))?;
        if product.status == ProductStatus::Ready {
            return Ok(ProductStatusView::Ready(assets_view(pool, product).await?));
        }
        Ok(ProductStatusView::Pending(ProductStatusData {
            id: product.id,
            name: product.name,
            status: product.status,
            created_at: product.created_date,
            updated_at: product.updated_date,
        }))
    }

    /// Products of `owner_id`; callers may only list their own.
    pub async fn user_products(
        pool: &PgPool,
        caller_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<ProductWithPrimaryAsset>, AppError> {
        if caller_id != owner_id {
            return Err(AppError::forbidden("You can only list your own products"));
        }
        Ok(ProductRepository::list_with_primary_image(pool, owner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::str::FromStr;

    fn row() -> ProductRow {
        ProductRow {
            id: Uuid::new_v4(),
            org_id: None,
            name: "Chair".into(),
            slug: "chair".into(),
            status: ProductStatus::Draft,
            description: Some("Oak".into()),
            price: None,
            currency_type: None,
            background_id: None,
            metadata: ProductMetadata {
                brand: Some("Acme".into()),
                accent_color: Some("#111111".into()),
                accent_overlay: None,
                tags: vec!["wood".into()],
            },
            created_by: None,
            created_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut product = row();
        let renamed = apply_update(
            &mut product,
            ProductUpdate {
                brand: Some("Other".into()),
                ..Default::default()
            },
            false,
        );
        assert!(!renamed);
        assert_eq!(product.metadata.brand.as_deref(), Some("Other"));
        assert_eq!(product.description.as_deref(), Some("Oak"));
        assert_eq!(product.metadata.tags, vec!["wood".to_string()]);
    }

    #[test]
    fn test_put_replaces_everything() {
        let mut product = row();
        let renamed = apply_update(
            &mut product,
            ProductUpdate {
                name: Some("Sofa".into()),
                ..Default::default()
            },
            true,
        );
        assert!(renamed);
        assert_eq!(product.name, "Sofa");
        assert!(product.description.is_none());
        assert!(product.metadata.brand.is_none());
        assert!(product.metadata.tags.is_empty());
    }

    #[test]
    fn test_response_defaults_accent_color() {
        let mut product = row();
        product.metadata.accent_color = None;
        let response = ProductResponse::from(product);
        assert_eq!(response.accent_color, DEFAULT_ACCENT_COLOR);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("configurator").is_none());
        assert_eq!(json["status"], "draft");
    }

    #[test]
    fn test_stored_price_truncates() {
        assert_eq!(stored_price(Decimal::from_str("1999.99").unwrap()), Some(1999));
        assert_eq!(stored_price(Decimal::from(0)), Some(0));
    }

    #[test]
    fn test_public_id_shape() {
        let id = public_id();
        assert_eq!(id.len(), PUBLIC_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_other_users_products_are_forbidden() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let err = ProductService::user_products(db.pool(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_concurrent_same_name_products_get_distinct_slugs() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();
        let name = format!("Slug Race Chair {}", Uuid::new_v4().simple());

        let mut users = Vec::new();
        for _ in 0..8 {
            let user: Uuid = sqlx::query_scalar(
                "INSERT INTO tbl_users (email, name) VALUES ($1, 'Slug Tester') RETURNING id",
            )
            .bind(format!("slug-{}@example.com", Uuid::new_v4()))
            .fetch_one(&pool)
            .await
            .unwrap();
            let mut tx = pool.begin().await.unwrap();
            LicensingService::create_free_plan_license(&mut tx, user).await.unwrap();
            tx.commit().await.unwrap();
            users.push(user);
        }

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let pool = pool.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    let req = ProductCreate {
                        name,
                        description: None,
                        brand: None,
                        accent_color: None,
                        accent_overlay: None,
                        tags: None,
                    };
                    ProductService::create(&pool, user, req, &RequestMeta::default()).await
                })
            })
            .collect();

        let mut slugs = HashSet::new();
        for handle in handles {
            let product = handle.await.unwrap().expect("create must not fail on a slug clash");
            assert!(slugs.insert(product.slug));
        }
        let base = slugify(&name);
        assert!(slugs.contains(&base));
        assert!((2..=8).all(|n| slugs.contains(&format!("{}-{}", base, n))));
    }
}
