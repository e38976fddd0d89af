//! Search across the products and galleries of the caller's organisation.

pub mod handlers;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::gallery::GalleryRepository;
use crate::gallery::types::short_id;
use crate::organization::OrganizationService;
use crate::product::ProductRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Products,
    Galleries,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200))]
    pub q: String,
    /// Restrict to `products` or `galleries`
    #[serde(rename = "type")]
    #[param(value_type = Option<String>)]
    pub scope: Option<SearchScope>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50))]
    pub limit: i64,
}

impl SearchQuery {
    fn includes(&self, scope: SearchScope) -> bool {
        self.scope.is_none_or(|s| s == scope)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    /// `product` or `gallery`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    /// Client route of the hit
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub query: String,
}

pub struct SearchService;

impl SearchService {
    pub async fn search(pool: &PgPool, user_id: Uuid, query: &SearchQuery) -> Result<SearchResults, AppError> {
        let q = query.q.trim();
        let mut results = Vec::new();
        let Some(org_id) = OrganizationService::find_org_id(pool, user_id).await? else {
            return Ok(SearchResults {
                results,
                total: 0,
                query: q.to_string(),
            });
        };

        if query.includes(SearchScope::Products) {
            for product in ProductRepository::search(pool, org_id, q, query.limit).await? {
                results.push(SearchHit {
                    kind: "product".into(),
                    id: product.id.to_string(),
                    url: format!("/products/{}", product.id),
                    name: product.name,
                    description: product.description,
                    status: product.status.to_string(),
                });
            }
        }
        if query.includes(SearchScope::Galleries) {
            for gallery in GalleryRepository::search(pool, org_id, q, query.limit).await? {
                let short = short_id(gallery.id);
                results.push(SearchHit {
                    kind: "gallery".into(),
                    url: format!("/galleries/{}", short),
                    id: short,
                    name: gallery.name,
                    description: gallery.settings.description,
                    status: "ready".into(),
                });
            }
        }

        results.truncate(query.limit.max(0) as usize);
        Ok(SearchResults {
            total: results.len(),
            results,
            query: q.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_and_scope() {
        let query: SearchQuery = serde_json::from_str(r#"{"q":"chair"}"#).unwrap();
        assert_eq!(query.limit, 10);
        assert!(query.includes(SearchScope::Products));
        assert!(query.includes(SearchScope::Galleries));

        let galleries: SearchQuery =
            serde_json::from_str(r#"{"q":"chair","type":"galleries","limit":5}"#).unwrap();
        assert!(!galleries.includes(SearchScope::Products));
        assert!(galleries.includes(SearchScope::Galleries));
    }

    #[test]
    fn test_query_validation() {
        let too_many: SearchQuery = serde_json::from_str(r#"{"q":"a","limit":51}"#).unwrap();
        assert!(too_many.validate().is_err());
        let empty: SearchQuery = serde_json::from_str(r#"{"q":""}"#).unwrap();
        assert!(empty.validate().is_err());
        assert!(serde_json::from_str::<SearchQuery>(r#"{"q":"a","type":"users"}"#).is_err());
    }
}
