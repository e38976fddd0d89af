//! TTL-based cache for reference endpoints (currencies, backgrounds, link types)
//!
//! Uses the `cached` crate for automatic TTL expiration, so edits made to the
//! reference tables show up within TTL_SECONDS without a restart.

use cached::proc_macro::cached;
use sqlx::PgPool;

use crate::product::reference::{
    BackgroundResponse, BackgroundTypeResponse, CurrencyTypeResponse, ReferenceRepository,
};
use crate::product_link::{LinkTypeResponse, ProductLinkRepository};

/// TTL for reference cache in seconds
pub const TTL_SECONDS: u64 = 60;

#[cached(
    time = 60,
    key = "String",
    convert = r#"{ "currency_types".to_string() }"#,
    result = true
)]
pub async fn load_currency_types_cached(pool: PgPool) -> Result<Vec<CurrencyTypeResponse>, String> {
    tracing::debug!("[cache] Loading currency types from database");
    ReferenceRepository::currency_types(&pool)
        .await
        .map_err(|e| format!("Failed to load currency types: {}", e))
}

#[cached(
    time = 60,
    key = "String",
    convert = r#"{ "background_types".to_string() }"#,
    result = true
)]
pub async fn load_background_types_cached(
    pool: PgPool,
) -> Result<Vec<BackgroundTypeResponse>, String> {
    tracing::debug!("[cache] Loading background types from database");
    ReferenceRepository::background_types(&pool)
        .await
        .map_err(|e| format!("Failed to load background types: {}", e))
}

/// Misses are cached as `None` for the same TTL.
#[cached(time = 60, key = "i32", convert = r#"{ id }"#, result = true)]
pub async fn load_background_cached(
    pool: PgPool,
    id: i32,
) -> Result<Option<BackgroundResponse>, String> {
    ReferenceRepository::background(&pool, id)
        .await
        .map_err(|e| format!("Failed to load background {}: {}", id, e))
}

#[cached(
    time = 60,
    key = "String",
    convert = r#"{ "link_types".to_string() }"#,
    result = true
)]
pub async fn load_link_types_cached(pool: PgPool) -> Result<Vec<LinkTypeResponse>, String> {
    tracing::debug!("[cache] Loading product link types from database");
    ProductLinkRepository::link_types(&pool)
        .await
        .map_err(|e| format!("Failed to load link types: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_constant() {
        assert_eq!(TTL_SECONDS, 60);
    }
}
