use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::repository::{AnalyticsRepository, ResumeRow};
use super::types::*;
use crate::db::json_text;
use crate::error::AppError;
use crate::organization::OrganizationService;

const RESUME_CARDS: i64 = 3;
const INSIGHT_DAYS: i64 = 7;
/// Progress shown for a processing product that reports none.
const DEFAULT_PROCESSING_PROGRESS: i64 = 50;

/// `1234567` → `1,234,567`
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// Signed percentage change, `+0%` without a previous period.
pub fn views_change(current: i64, previous: i64) -> String {
    if previous <= 0 {
        return "+0%".to_string();
    }
    let pct = (current - previous) as f64 / previous as f64 * 100.0;
    if pct > 0.0 {
        format!("+{:.0}%", pct)
    } else {
        format!("{:.0}%", pct)
    }
}

pub fn engagement_rate(engaged: i64, views: i64) -> String {
    let rate = if views > 0 {
        engaged as f64 / views as f64 * 100.0
    } else {
        0.0
    };
    format!("{:.1}%", rate)
}

/// Draft is 0; processing reads `processing_progress` from the metadata.
pub fn resume_progress(status: &str, metadata: Option<&str>) -> Option<i64> {
    match status {
        "draft" => Some(0),
        "processing" => {
            let meta: serde_json::Map<String, Value> = json_text(metadata);
            let progress = meta
                .get("processing_progress")
                .and_then(Value::as_i64)
                .unwrap_or(DEFAULT_PROCESSING_PROGRESS);
            Some(progress.clamp(0, 100))
        }
        _ => None,
    }
}

impl From<ResumeRow> for ResumeCard {
    fn from(row: ResumeRow) -> Self {
        Self {
            progress: resume_progress(&row.status, row.metadata.as_deref()),
            product_id: row.id,
            product_name: row.name,
            status: row.status,
            thumbnail_url: row.thumbnail_url,
        }
    }
}

pub struct AnalyticsService;

impl AnalyticsService {
    /// Totals, the `Views` series and the top products of the caller's organisation.
    pub async fn overview(
        pool: &PgPool,
        user_id: Uuid,
        query: &OverviewQuery,
    ) -> Result<AnalyticsOverview, AppError> {
        let (start, end) = query.window(Utc::now().date_naive())?;
        let Some(org_id) = OrganizationService::find_org_id(pool, user_id).await? else {
            return Ok(AnalyticsOverview {
                summary: AnalyticsSummary::default(),
                time_series: vec![AnalyticsTimeSeries {
                    label: "Views".into(),
                    data: Vec::new(),
                }],
                top_products: Vec::new(),
            });
        };
        let product = query.product();

        let (summary, series, top_products) = futures::try_join!(
            AnalyticsRepository::summary(pool, org_id, product, start, end),
            AnalyticsRepository::daily_views(pool, org_id, product, start, end),
            AnalyticsRepository::top_products(pool, org_id, start, end, TOP_PRODUCTS),
        )?;

        Ok(AnalyticsOverview {
            summary,
            time_series: vec![AnalyticsTimeSeries {
                label: "Views".into(),
                data: series,
            }],
            top_products,
        })
    }

    /// Store the raw event and bump the product's daily counter.
    pub async fn track(pool: &PgPool, event: &AnalyticsEventRequest) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        let product_org = match event.product_id {
            Some(product_id) => AnalyticsRepository::product_org(&mut tx, product_id).await?,
            None => None,
        };
        let org_id = product_org.or(event.org_id);
        let event_id = AnalyticsRepository::insert_event(&mut tx, event, org_id).await?;

        if let (Some(product_id), Some(org_id), Some(counter)) = (
            event.product_id,
            product_org,
            DailyCounter::for_event(&event.event_type),
        ) {
            let today = Utc::now().date_naive();
            AnalyticsRepository::bump_daily(&mut tx, today, org_id, product_id, counter).await?;
        }
        tx.commit().await?;

        tracing::debug!(event_id, event_type = %event.event_type, "Analytics event tracked");
        Ok(())
    }
}

pub struct DashboardService;

impl DashboardService {
    pub async fn overview(pool: &PgPool, user_id: Uuid) -> Result<DashboardOverview, AppError> {
        let Some(org_id) = OrganizationService::find_org_id(pool, user_id).await? else {
            return Ok(DashboardOverview {
                resume: Vec::new(),
                insights: Vec::new(),
            });
        };

        let today = Utc::now().date_naive();
        let week_start = today - Duration::days(INSIGHT_DAYS);
        let prev_start = week_start - Duration::days(INSIGHT_DAYS);
        let prev_end: NaiveDate = week_start - Duration::days(1);

        let (resume, current, previous, top) = futures::try_join!(
            AnalyticsRepository::resume_products(pool, org_id, RESUME_CARDS),
            AnalyticsRepository::summary(pool, org_id, None, week_start, today),
            AnalyticsRepository::summary(pool, org_id, None, prev_start, prev_end),
            AnalyticsRepository::top_product_since(pool, org_id, week_start),
        )?;

        let mut insights = vec![
            InsightCard {
                kind: "views".into(),
                title: "Total Views".into(),
                value: thousands(current.views),
                change: Some(views_change(current.views, previous.views)),
                icon: Some("eye".into()),
            },
            InsightCard {
                kind: "engagement".into(),
                title: "Engagement Rate".into(),
                value: engagement_rate(current.engaged_views, current.views),
                change: None,
                icon: Some("activity".into()),
            },
        ];
        if let Some((name, views)) = top {
            insights.push(InsightCard {
                kind: "topProduct".into(),
                title: "Top Product".into(),
                value: name,
                change: Some(format!("{} views", thousands(views))),
                icon: Some("star".into()),
            });
        }

        Ok(DashboardOverview {
            resume: resume.into_iter().map(ResumeCard::from).collect(),
            insights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(-4500), "-4,500");
    }

    #[test]
    fn test_views_change() {
        assert_eq!(views_change(10, 0), "+0%");
        assert_eq!(views_change(150, 100), "+50%");
        assert_eq!(views_change(50, 100), "-50%");
        assert_eq!(views_change(100, 100), "0%");
    }

    #[test]
    fn test_engagement_rate() {
        assert_eq!(engagement_rate(0, 0), "0.0%");
        assert_eq!(engagement_rate(1, 3), "33.3%");
        assert_eq!(engagement_rate(5, 5), "100.0%");
    }

    #[test]
    fn test_resume_progress() {
        assert_eq!(resume_progress("draft", None), Some(0));
        assert_eq!(resume_progress("processing", None), Some(50));
        assert_eq!(
            resume_progress("processing", Some(r#"{"processing_progress": 80}"#)),
            Some(80)
        );
        assert_eq!(
            resume_progress("processing", Some(r#"{"processing_progress": 400}"#)),
            Some(100)
        );
        assert_eq!(resume_progress("ready", None), None);
    }
}
