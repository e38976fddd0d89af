//! Quota arithmetic over the JSON `limits` / `usage_counters` maps.
//!
//! Pure functions only; the row locking lives in [`super::service`].

use serde_json::{Map, Value, json};

use crate::error::AppError;

/// Usage ratio at which a warning notification is sent.
pub const WARNING_THRESHOLD_PERCENT: i64 = 80;

/// A metered resource. Each kind has a plan limit key and a usage counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Products,
    AiCredits,
    PublicViews,
    Galleries,
}

impl QuotaKind {
    pub fn limit_key(self) -> &'static str {
        match self {
            Self::Products => "max_products",
            Self::AiCredits => "max_ai_credits_month",
            Self::PublicViews => "max_public_views",
            Self::Galleries => "max_galleries",
        }
    }

    pub fn usage_key(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::AiCredits => "ai_credits",
            Self::PublicViews => "public_views",
            Self::Galleries => "galleries",
        }
    }

    /// Human name used in warnings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::AiCredits => "AI credits",
            Self::PublicViews => "public views",
            Self::Galleries => "galleries",
        }
    }

    fn exceeded_message(self) -> &'static str {
        match self {
            Self::Products => "Product limit exceeded. Upgrade your plan to create more products.",
            Self::AiCredits => "AI credit limit exceeded. Upgrade your plan for more credits.",
            Self::PublicViews => "Public view limit exceeded for this billing period.",
            Self::Galleries => "Gallery limit exceeded. Upgrade your plan to create more galleries.",
        }
    }
}

/// Refusal carrying the numbers that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDenied {
    pub kind: QuotaKind,
    pub limit: i64,
    pub current: i64,
}

impl QuotaDenied {
    pub fn details(&self) -> Value {
        json!({
            "limit": self.limit,
            "current": self.current,
            "quota": self.kind.limit_key(),
        })
    }
}

impl From<QuotaDenied> for AppError {
    fn from(denied: QuotaDenied) -> Self {
        AppError::QuotaExceeded {
            message: denied.kind.exceeded_message().to_string(),
            details: denied.details(),
        }
    }
}

/// Integer counter from a JSON map; absent, null and non-numeric entries read as `None`.
pub fn read_counter(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `None` limit means unlimited.
pub fn check_quota(
    kind: QuotaKind,
    limit: Option<i64>,
    current: i64,
    increment: i64,
) -> Result<(), QuotaDenied> {
    match limit {
        Some(limit) if current + increment > limit => Err(QuotaDenied {
            kind,
            limit,
            current,
        }),
        _ => Ok(()),
    }
}

/// Whole-number share of `limit` consumed, when a positive limit exists.
pub fn usage_percentage(used: i64, limit: Option<i64>) -> Option<i64> {
    match limit {
        Some(limit) if limit > 0 => Some(used * 100 / limit),
        _ => None,
    }
}

pub fn should_warn(used: i64, limit: Option<i64>) -> bool {
    usage_percentage(used, limit).is_some_and(|p| p >= WARNING_THRESHOLD_PERCENT)
}

/// Return a copy of `usage` with the kind's counter moved by `delta`, floored at zero.
pub fn bump_usage(usage: &Map<String, Value>, kind: QuotaKind, delta: i64) -> Map<String, Value> {
    let mut next = usage.clone();
    let current = read_counter(usage, kind.usage_key()).unwrap_or(0);
    next.insert(
        kind.usage_key().to_string(),
        Value::from((current + delta).max(0)),
    );
    next
}

/// Parse a JSON-in-TEXT column into an object map.
pub fn parse_map(raw: Option<&str>) -> Map<String, Value> {
    crate::db::json_text(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_no_limit_allows() {
        assert!(check_quota(QuotaKind::Galleries, None, 500, 1).is_ok());
    }

    #[test]
    fn test_limit_boundary() {
        assert!(check_quota(QuotaKind::Products, Some(2), 1, 1).is_ok());
        let denied = check_quota(QuotaKind::Products, Some(2), 2, 1).unwrap_err();
        assert_eq!(denied.limit, 2);
        assert_eq!(denied.current, 2);
        assert_eq!(denied.details()["quota"], "max_products");
    }

    #[test]
    fn test_multi_unit_increment() {
        assert!(check_quota(QuotaKind::AiCredits, Some(5), 3, 3).is_err());
        assert!(check_quota(QuotaKind::AiCredits, Some(5), 3, 2).is_ok());
    }

    #[test]
    fn test_denied_converts_to_quota_error() {
        let err: AppError = QuotaDenied {
            kind: QuotaKind::Products,
            limit: 2,
            current: 2,
        }
        .into();
        assert_eq!(err.code(), crate::error::ErrorCode::QuotaExceeded);
        assert!(err.to_string().starts_with("Product limit exceeded"));
    }

    #[test]
    fn test_read_counter_variants() {
        let m = map(json!({"a": 3, "b": "7", "c": null, "d": 2.0, "e": true}));
        assert_eq!(read_counter(&m, "a"), Some(3));
        assert_eq!(read_counter(&m, "b"), Some(7));
        assert_eq!(read_counter(&m, "c"), None);
        assert_eq!(read_counter(&m, "d"), Some(2));
        assert_eq!(read_counter(&m, "e"), None);
        assert_eq!(read_counter(&m, "missing"), None);
    }

    #[test]
    fn test_bump_usage_keeps_other_counters() {
        let usage = map(json!({"ai_credits": 4, "public_views": 10}));
        let next = bump_usage(&usage, QuotaKind::AiCredits, 1);
        assert_eq!(next["ai_credits"], 5);
        assert_eq!(next["public_views"], 10);

        let floored = bump_usage(&usage, QuotaKind::Galleries, -1);
        assert_eq!(floored["galleries"], 0);
    }

    #[test]
    fn test_warning_threshold() {
        assert!(!should_warn(3, Some(5)));
        assert!(should_warn(4, Some(5)));
        assert!(should_warn(2, Some(2)));
        assert!(!should_warn(100, None));
        assert!(!should_warn(1, Some(0)));
        assert_eq!(usage_percentage(40, Some(50)), Some(80));
    }
}
