//! Purchase / info / video links attached to a product.
//!
//! Links are append-only through the bulk endpoint and soft-deleted
//! (`isactive = FALSE`) on removal. `PUT /products/{id}/details` replaces
//! the active set through [`ProductLinkService::replace_links`].

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::repository::ProductLinkRepository;
use crate::error::AppError;
use crate::product::repository::ProductRepository;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LinkTypeResponse {
    pub id: i32,
    #[schema(example = "buy")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LinkInput {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Buy on our store")]
    pub name: String,
    #[validate(url)]
    #[schema(example = "https://shop.example.com/chair")]
    pub link: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Id from `GET /product-link-types`
    pub link_type: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BulkLinkCreate {
    #[validate(length(min = 1), nested)]
    pub links: Vec<LinkInput>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductLinkUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub link: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub link_type: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ProductLinkResponse {
    pub id: i32,
    pub name: String,
    pub link: String,
    pub description: Option<String>,
    pub link_type_id: Option<i32>,
    pub link_type_name: Option<String>,
}

/// First requested type id missing from `known`, in ascending order.
pub fn first_unknown_type(requested: &BTreeSet<i32>, known: &[i32]) -> Option<i32> {
    requested.iter().copied().find(|id| !known.contains(id))
}

pub struct ProductLinkService;

impl ProductLinkService {
    /// Reject the batch when any `link_type` is unknown or inactive.
    async fn ensure_link_types(
        conn: &mut PgConnection,
        links: impl IntoIterator<Item = Option<i32>>,
    ) -> Result<(), AppError> {
        let requested: BTreeSet<i32> = links.into_iter().flatten().collect();
        if requested.is_empty() {
            return Ok(());
        }
        let ids: Vec<i32> = requested.iter().copied().collect();
        let known = ProductLinkRepository::active_type_ids(conn, &ids).await?;
        match first_unknown_type(&requested, &known) {
            Some(id) => Err(AppError::bad_request(format!("Invalid link type: {}", id))),
            None => Ok(()),
        }
    }

    async fn ensure_product(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if ProductRepository::exists_owned(pool, product_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Product not found"))
        }
    }

    pub async fn list_links(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ProductLinkResponse>, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        Ok(ProductLinkRepository::list_active(pool, product_id).await?)
    }

    /// Append links; existing ones are kept.
    pub async fn create_links(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
        links: &[LinkInput],
    ) -> Result<Vec<ProductLinkResponse>, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;

        let mut tx = pool.begin().await?;
        Self::ensure_link_types(&mut tx, links.iter().map(|l| l.link_type)).await?;
        let mut created = Vec::with_capacity(links.len());
        for link in links {
            created.push(ProductLinkRepository::insert(&mut tx, product_id, user_id, link).await?);
        }
        tx.commit().await?;

        tracing::info!(%product_id, count = created.len(), "Product links created");
        let all = ProductLinkRepository::list_active(pool, product_id).await?;
        Ok(all.into_iter().filter(|l| created.contains(&l.id)).collect())
    }

    /// Swap the active set for `links` inside the caller's transaction.
    pub async fn replace_links(
        conn: &mut PgConnection,
        product_id: Uuid,
        user_id: Uuid,
        links: &[LinkInput],
    ) -> Result<(), AppError> {
        Self::ensure_link_types(&mut *conn, links.iter().map(|l| l.link_type)).await?;
        let removed = ProductLinkRepository::deactivate_all(&mut *conn, product_id, user_id).await?;
        for link in links {
            ProductLinkRepository::insert(&mut *conn, product_id, user_id, link).await?;
        }
        tracing::debug!(%product_id, removed, added = links.len(), "Product links replaced");
        Ok(())
    }

    pub async fn update_link(
        pool: &PgPool,
        link_id: i32,
        user_id: Uuid,
        update: &ProductLinkUpdate,
    ) -> Result<ProductLinkResponse, AppError> {
        let mut tx = pool.begin().await?;
        if ProductLinkRepository::find_owned(&mut tx, link_id, user_id).await?.is_none() {
            return Err(AppError::not_found("Link not found"));
        }
        Self::ensure_link_types(&mut tx, [update.link_type]).await?;
        ProductLinkRepository::update(&mut tx, link_id, user_id, update).await?;
        let updated = ProductLinkRepository::find_owned(&mut tx, link_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Link not found"))?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_link(pool: &PgPool, link_id: i32, user_id: Uuid) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        if ProductLinkRepository::find_owned(&mut tx, link_id, user_id).await?.is_none() {
            return Err(AppError::not_found("Link not found"));
        }
        ProductLinkRepository::soft_delete(&mut tx, link_id, user_id).await?;
        tx.commit().await?;
        tracing::info!(link_id, "Product link deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_input_validation() {
        let ok: LinkInput = serde_json::from_value(json!({
            "name": "Buy", "link": "https://shop.example.com/p/1", "link_type": 1
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: LinkInput =
            serde_json::from_value(json!({"name": "", "link": "not a url"})).unwrap();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("link"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let parsed: Result<LinkInput, _> = serde_json::from_value(json!({
            "name": "Buy", "link": "https://a.b", "price": 3
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_bulk_requires_one_link() {
        let empty = BulkLinkCreate { links: vec![] };
        let errors = empty.validate().unwrap_err();
        let length = &errors.field_errors()["links"][0];
        assert_eq!(length.code, "length");
        // the rejected value is echoed back in the error params
        assert_eq!(length.params["value"], json!([]));
    }

    #[test]
    fn test_bulk_validates_each_link() {
        let bulk: BulkLinkCreate = serde_json::from_value(json!({"links": [
            {"name": "Buy", "link": "https://shop.example.com/p/1"},
            {"name": "", "link": "not a url"}
        ]}))
        .unwrap();
        let errors = bulk.validate().unwrap_err();
        assert!(errors.errors().contains_key("links"));
    }

    #[test]
    fn test_first_unknown_type() {
        let requested: BTreeSet<i32> = [3, 1, 9].into_iter().collect();
        assert_eq!(first_unknown_type(&requested, &[1, 3]), Some(9));
        assert_eq!(first_unknown_type(&requested, &[1, 3, 9]), None);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_seeded_link_types() {
        let db = crate::db::Database::connect(&crate::db::test_database_url())
            .await
            .unwrap();
        let types = ProductLinkRepository::link_types(db.pool()).await.unwrap();
        assert!(types.iter().any(|t| t.name == "buy"));
    }
}
