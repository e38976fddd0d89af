//! Subscription summary for `GET /subscriptions/me`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use utoipa::ToSchema;
use uuid::Uuid;

use super::quota::{QuotaKind, read_counter};
use super::service::LicensingService;

use crate::db::SafeRow;

/// Assumed trial length when only the end date is stored.
const TRIAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct QuotaUsage {
    pub included: i64,
    pub purchased: i64,
    pub used: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct QuotaInfo {
    pub used: i64,
    /// `null` means unlimited
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_credits: Option<QuotaUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_views: Option<QuotaUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<QuotaInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galleries: Option<QuotaInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrialInfo {
    pub active: bool,
    pub days_remaining: i64,
    pub started_at: Option<DateTime<Utc>>,
}

impl TrialInfo {
    fn inactive() -> Self {
        Self {
            active: false,
            days_remaining: 0,
            started_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubscriptionMe {
    /// free, pro or enterprise
    pub plan: String,
    pub trial: TrialInfo,
    pub quotas: QuotaSet,
}

impl SubscriptionMe {
    /// Shown to users without any license.
    pub fn free_defaults() -> Self {
        Self {
            plan: "free".to_string(),
            trial: TrialInfo::inactive(),
            quotas: QuotaSet {
                ai_credits: Some(QuotaUsage {
                    included: 5,
                    purchased: 0,
                    used: 0,
                }),
                public_views: Some(QuotaUsage {
                    included: 1000,
                    purchased: 0,
                    used: 0,
                }),
                products: Some(QuotaInfo { used: 0, limit: Some(2) }),
                galleries: Some(QuotaInfo { used: 0, limit: Some(0) }),
            },
        }
    }
}

pub fn trial_info(trial_end_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TrialInfo {
    match trial_end_at {
        Some(end) if end > now => TrialInfo {
            active: true,
            days_remaining: (end - now).num_days().max(0),
            started_at: Some(end - Duration::days(TRIAL_DAYS)),
        },
        _ => TrialInfo::inactive(),
    }
}

pub fn build_quotas(
    limits: &Map<String, Value>,
    usage: &Map<String, Value>,
    product_count: i64,
) -> QuotaSet {
    let counter = |kind: QuotaKind| read_counter(usage, kind.usage_key()).unwrap_or(0);
    QuotaSet {
        ai_credits: Some(QuotaUsage {
            included: read_counter(limits, QuotaKind::AiCredits.limit_key()).unwrap_or(5),
            purchased: 0,
            used: counter(QuotaKind::AiCredits),
        }),
        public_views: Some(QuotaUsage {
            included: read_counter(limits, QuotaKind::PublicViews.limit_key()).unwrap_or(1000),
            purchased: 0,
            used: counter(QuotaKind::PublicViews),
        }),
        products: Some(QuotaInfo {
            used: product_count,
            limit: read_counter(limits, QuotaKind::Products.limit_key()),
        }),
        galleries: Some(QuotaInfo {
            used: counter(QuotaKind::Galleries),
            limit: read_counter(limits, QuotaKind::Galleries.limit_key()),
        }),
    }
}

pub struct SubscriptionService;

impl SubscriptionService {
    pub async fn get_user_subscription(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<SubscriptionMe, sqlx::Error> {
        let Some(license) = LicensingService::get_active_license(pool, user_id).await? else {
            return Ok(SubscriptionMe::free_defaults());
        };

        let row = sqlx::query(
            r#"
            SELECT s.trial_end_at, p.code
            FROM tbl_subscriptions s
            JOIN tbl_mstr_plans p ON p.id = s.plan_id
            WHERE s.id = $1
            "#,
        )
        .bind(license.subscription_id)
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            tracing::warn!(%user_id, subscription_id = %license.subscription_id, "License without subscription");
            return Ok(SubscriptionMe {
                plan: "free".to_string(),
                trial: TrialInfo::inactive(),
                quotas: QuotaSet::default(),
            });
        };

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tbl_products WHERE created_by = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(SubscriptionMe {
            plan: row.get("code"),
            trial: trial_info(row.try_get_opt("trial_end_at"), Utc::now()),
            quotas: build_quotas(&license.limits, &license.usage, product_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_defaults_shape() {
        let value = serde_json::to_value(SubscriptionMe::free_defaults()).unwrap();
        assert_eq!(value["plan"], "free");
        assert_eq!(value["trial"]["daysRemaining"], 0);
        assert_eq!(value["quotas"]["products"]["limit"], 2);
        assert_eq!(value["quotas"]["galleries"]["limit"], 0);
        assert_eq!(value["quotas"]["aiCredits"]["included"], 5);
    }

    #[test]
    fn test_empty_quota_set_serializes_to_empty_object() {
        let value = serde_json::to_value(QuotaSet::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_build_quotas_reads_limits_and_usage() {
        let limits = json!({"max_products": 50, "max_ai_credits_month": 50, "max_galleries": 10});
        let usage = json!({"ai_credits": 7, "galleries": 3});
        let q = build_quotas(
            limits.as_object().unwrap(),
            usage.as_object().unwrap(),
            12,
        );
        assert_eq!(q.ai_credits.unwrap().included, 50);
        assert_eq!(q.ai_credits.unwrap().used, 7);
        assert_eq!(q.public_views.unwrap().included, 1000);
        assert_eq!(q.products.unwrap(), QuotaInfo { used: 12, limit: Some(50) });
        assert_eq!(q.galleries.unwrap(), QuotaInfo { used: 3, limit: Some(10) });
    }

    #[test]
    fn test_unlimited_is_null() {
        let q = build_quotas(&Map::new(), &Map::new(), 0);
        let value = serde_json::to_value(q).unwrap();
        assert!(value["products"]["limit"].is_null());
    }

    #[test]
    fn test_trial_info() {
        let now = Utc::now();
        let active = trial_info(Some(now + Duration::days(3) + Duration::hours(1)), now);
        assert!(active.active);
        assert_eq!(active.days_remaining, 3);
        assert!(active.started_at.is_some());

        assert!(!trial_info(Some(now - Duration::days(1)), now).active);
        assert!(!trial_info(None, now).active);
    }
}
