//! Audit trail of user actions (`tbl_activity_logs`).
//!
//! Logging is best-effort: a failed insert is reported through `tracing`
//! and never fails the request that triggered it.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Caller address and agent, captured for audit rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// First `x-forwarded-for` hop wins over the socket peer.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let ip = forwarded.or_else(|| peer.map(|p| p.ip().to_string()));
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self { ip, user_agent }
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}

/// One audit entry.
#[derive(Debug, Clone)]
pub struct ActivityEntry<'a> {
    pub action: &'a str,
    pub actor: Option<Uuid>,
    pub org_id: Option<Uuid>,
    pub target_type: Option<&'a str>,
    pub target_id: Option<String>,
    pub metadata: Option<Value>,
}

impl<'a> ActivityEntry<'a> {
    pub fn auth(action: &'a str, user_id: Uuid) -> Self {
        Self {
            action,
            actor: Some(user_id),
            org_id: None,
            target_type: Some("user"),
            target_id: Some(user_id.to_string()),
            metadata: None,
        }
    }

    pub fn product(action: &'a str, user_id: Uuid, product_id: Uuid) -> Self {
        Self {
            action,
            actor: Some(user_id),
            org_id: None,
            target_type: Some("product"),
            target_id: Some(product_id.to_string()),
            metadata: None,
        }
    }

    pub fn gallery(action: &'a str, user_id: Uuid, org_id: Uuid, gallery_id: Uuid) -> Self {
        Self {
            action,
            actor: Some(user_id),
            org_id: Some(org_id),
            target_type: Some("gallery"),
            target_id: Some(gallery_id.to_string()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub struct ActivityService;

impl ActivityService {
    pub async fn log(pool: &PgPool, entry: ActivityEntry<'_>, meta: &RequestMeta) {
        let metadata = entry.metadata.as_ref().map(Value::to_string);
        let result = sqlx::query(
            r#"
            INSERT INTO tbl_activity_logs
                (actor_user_id, org_id, target_type, target_id, action, ip, user_agent, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.actor)
        .bind(entry.org_id)
        .bind(entry.target_type)
        .bind(&entry.target_id)
        .bind(entry.action)
        .bind(&meta.ip)
        .bind(&meta.user_agent)
        .bind(metadata)
        .execute(pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(action = entry.action, "Failed to record activity: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let meta = RequestMeta::from_headers(&headers, Some(peer));
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer: SocketAddr = "192.0.2.10:443".parse().unwrap();
        let meta = RequestMeta::from_headers(&HeaderMap::new(), Some(peer));
        assert_eq!(meta.ip.as_deref(), Some("192.0.2.10"));
        assert!(meta.user_agent.is_none());
    }

    #[test]
    fn test_product_entry_targets_product() {
        let user = Uuid::new_v4();
        let product = Uuid::new_v4();
        let entry = ActivityEntry::product("product.created", user, product)
            .with_metadata(serde_json::json!({"name": "Chair"}));
        assert_eq!(entry.target_type, Some("product"));
        assert_eq!(entry.target_id, Some(product.to_string()));
        assert_eq!(entry.metadata.unwrap()["name"], "Chair");
    }
}
