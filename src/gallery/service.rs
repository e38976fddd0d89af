use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::repository::{GalleryRepository, GalleryRow};
use super::types::*;
use crate::activity::{ActivityEntry, ActivityService, RequestMeta};
use crate::error::AppError;
use crate::gateway::types::{PageMeta, Paged, page_window};
use crate::licensing::service::{GALLERY_PLANS, PRO_GALLERY_LIMIT};
use crate::licensing::{LicensingService, QuotaKind};
use crate::organization::OrganizationService;
use crate::slug::{lock_slug_family, slugify, unique_slug};

const ACCESS_DENIED: &str = "Gallery access requires Pro or Enterprise plan";
const CREATE_DENIED: &str = "Gallery creation requires Pro or Enterprise plan";
const NOT_FOUND: &str = "Gallery not found";

impl From<GalleryRow> for GalleryResponse {
    fn from(row: GalleryRow) -> Self {
        Self {
            short_id: short_id(row.id),
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.settings.description,
            thumbnail_color: row.settings.thumbnail_color,
            thumbnail_overlay: row.settings.thumbnail_overlay,
            tags: row.settings.tags,
            is_public: row.is_public,
            product_count: row.product_count,
            // Every gallery item carries exactly one asset
            asset_count: row.product_count,
            status: "ready".into(),
            created_at: row.created_date,
            updated_at: row.updated_date,
        }
    }
}

/// Apply an edit. `replace` clears every optional field the update leaves out.
/// Returns whether the name changed.
pub fn apply_update(row: &mut GalleryRow, update: GalleryUpdate, replace: bool) -> bool {
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
    set(&mut row.settings.description, update.description, replace);
    set(&mut row.settings.thumbnail_color, update.thumbnail_color, replace);
    set(&mut row.settings.thumbnail_overlay, update.thumbnail_overlay, replace);
    match update.tags {
        Some(tags) => row.settings.tags = tags,
        None if replace => row.settings.tags.clear(),
        None => {}
    }
    if let Some(is_public) = update.is_public {
        row.is_public = is_public;
    } else if replace {
        row.is_public = false;
    }
    renamed
}

async fn gallery_slug(
    conn: &mut PgConnection,
    org_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<String, sqlx::Error> {
    let base = slugify(name);
    let base = if base.is_empty() { "gallery".to_string() } else { base };
    lock_slug_family(conn, &format!("gallery:{}", org_id), &base).await?;
    let taken = GalleryRepository::taken_slugs(conn, org_id, &base, exclude).await?;
    Ok(unique_slug(&base, &taken))
}

pub struct GalleryService;

impl GalleryService {
    /// Organisation of a caller with gallery access.
    async fn authorize(pool: &PgPool, user_id: Uuid, denied: &str) -> Result<(String, Uuid), AppError> {
        let plan = LicensingService::get_user_plan_code(pool, user_id).await?;
        if !GALLERY_PLANS.contains(&plan.as_str()) {
            return Err(AppError::forbidden(denied));
        }
        let org_id = OrganizationService::get_or_create_org_id(pool, user_id, None).await?;
        Ok((plan, org_id))
    }

    async fn load(
        conn: &mut PgConnection,
        org_id: Uuid,
        raw_id: &str,
    ) -> Result<GalleryRow, AppError> {
        let gallery = GalleryRef::parse(raw_id).ok_or_else(|| AppError::not_found(NOT_FOUND))?;
        GalleryRepository::find(conn, org_id, &gallery)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND))
    }

    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        query: &GalleryListQuery,
    ) -> Result<Paged<GalleryResponse>, AppError> {
        let window = page_window(query.page, query.page_size)?;
        let (_, org_id) = Self::authorize(pool, user_id, ACCESS_DENIED).await?;
        let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let (rows, total) = GalleryRepository::list(
            pool,
            org_id,
            q,
            &order_clause(query.sort.as_deref()),
            window.page_size,
            window.offset,
        )
        .await?;
        Ok(Paged {
            items: rows.into_iter().map(GalleryResponse::from).collect(),
            meta: PageMeta::new(window.page, window.page_size, total),
        })
    }

    /// Create a gallery, consuming one unit of the gallery quota.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        req: GalleryCreate,
        meta: &RequestMeta,
    ) -> Result<GalleryResponse, AppError> {
        let (plan, org_id) = Self::authorize(pool, user_id, CREATE_DENIED).await?;
        let pro = plan == "pro";
        let settings = GallerySettings {
            description: req.description,
            thumbnail_color: req.thumbnail_color,
            thumbnail_overlay: req.thumbnail_overlay,
            tags: req.tags.unwrap_or_default(),
        };

        let mut tx = pool.begin().await?;
        let reservation = LicensingService::reserve_quota(
            &mut tx,
            user_id,
            QuotaKind::Galleries,
            1,
            pro.then_some(PRO_GALLERY_LIMIT),
        )
        .await
        .map_err(|e| match e {
            AppError::QuotaExceeded { details, .. } if pro => AppError::QuotaExceeded {
                message: "Gallery limit reached for Pro plan".into(),
                details,
            },
            other => other,
        })?;
        let slug = gallery_slug(&mut tx, org_id, &req.name, None).await?;
        let gallery = GalleryRepository::insert(
            &mut tx,
            org_id,
            &req.name,
            &slug,
            req.is_public.unwrap_or(false),
            &settings,
            user_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(gallery_id = %gallery.id, %org_id, "Gallery created");
        LicensingService::warn_if_near_limit(pool, user_id, reservation).await;
        ActivityService::log(
            pool,
            ActivityEntry::gallery("gallery.created", user_id, org_id, gallery.id),
            meta,
        )
        .await;
        Ok(gallery.into())
    }

    pub async fn get(pool: &PgPool, user_id: Uuid, raw_id: &str) -> Result<GalleryResponse, AppError> {
        let (_, org_id) = Self::authorize(pool, user_id, ACCESS_DENIED).await?;
        let mut conn = pool.acquire().await?;
        Ok(Self::load(&mut conn, org_id, raw_id).await?.into())
    }

    /// `PATCH` (partial) or `PUT` (`replace`).
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        raw_id: &str,
        update: GalleryUpdate,
        replace: bool,
        meta: &RequestMeta,
    ) -> Result<GalleryResponse, AppError> {
        let (_, org_id) = Self::authorize(pool, user_id, ACCESS_DENIED).await?;
        let mut tx = pool.begin().await?;
        let mut gallery = Self::load(&mut tx, org_id, raw_id).await?;
        if apply_update(&mut gallery, update, replace) {
            gallery.slug = gallery_slug(&mut tx, org_id, &gallery.name, Some(gallery.id)).await?;
        }
        let saved = GalleryRepository::save(&mut tx, &gallery, user_id).await?;
        tx.commit().await?;

        ActivityService::log(
            pool,
            ActivityEntry::gallery("gallery.updated", user_id, org_id, saved.id),
            meta,
        )
        .await;
        Ok(saved.into())
    }

    /// Remove the gallery; its products stay.
    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        raw_id: &str,
        meta: &RequestMeta,
    ) -> Result<(), AppError> {
        let (_, org_id) = Self::authorize(pool, user_id, ACCESS_DENIED).await?;
        let mut tx = pool.begin().await?;
        let gallery = Self::load(&mut tx, org_id, raw_id).await?;
        GalleryRepository::delete(&mut tx, gallery.id).await?;
        tx.commit().await?;

        if let Err(e) = LicensingService::release_quota(pool, user_id, QuotaKind::Galleries, 1).await {
            tracing::warn!(gallery_id = %gallery.id, "Failed to release gallery quota: {}", e);
        }
        tracing::info!(gallery_id = %gallery.id, "Gallery deleted");
        ActivityService::log(
            pool,
            ActivityEntry::gallery("gallery.deleted", user_id, org_id, gallery.id),
            meta,
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row() -> GalleryRow {
        GalleryRow {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "Spring".into(),
            slug: "spring".into(),
            is_public: true,
            settings: GallerySettings {
                description: Some("Pastels".into()),
                thumbnail_color: Some("#FFAA00".into()),
                thumbnail_overlay: None,
                tags: vec!["seasonal".into()],
            },
            product_count: 3,
            created_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    #[test]
    fn test_patch_keeps_absent_fields() {
        let mut gallery = row();
        let renamed = apply_update(
            &mut gallery,
            GalleryUpdate {
                thumbnail_overlay: Some("#000000".into()),
                ..Default::default()
            },
            false,
        );
        assert!(!renamed);
        assert_eq!(gallery.settings.description.as_deref(), Some("Pastels"));
        assert_eq!(gallery.settings.thumbnail_overlay.as_deref(), Some("#000000"));
        assert_eq!(gallery.settings.tags, vec!["seasonal".to_string()]);
        assert!(gallery.is_public);
    }

    #[test]
    fn test_put_clears_absent_fields() {
        let mut gallery = row();
        let renamed = apply_update(
            &mut gallery,
            GalleryUpdate {
                name: Some("Summer".into()),
                ..Default::default()
            },
            true,
        );
        assert!(renamed);
        assert_eq!(gallery.name, "Summer");
        assert!(gallery.settings.description.is_none());
        assert!(gallery.settings.thumbnail_color.is_none());
        assert!(gallery.settings.tags.is_empty());
        assert!(!gallery.is_public);
    }

    #[test]
    fn test_response_counts_and_short_id() {
        let gallery = row();
        let id = gallery.id;
        let response = GalleryResponse::from(gallery);
        assert_eq!(response.short_id, short_id(id));
        assert_eq!(response.product_count, 3);
        assert_eq!(response.asset_count, 3);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["thumbnailColor"], "#FFAA00");
        assert_eq!(json["status"], "ready");
    }
}
