use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Window of the overview when no dates are given.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const TOP_PRODUCTS: i64 = 5;

// ============================================================================
// Overview
// ============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OverviewQuery {
    /// Inclusive, defaults to 30 days before `endDate`
    pub start_date: Option<NaiveDate>,
    /// Inclusive, defaults to today
    pub end_date: Option<NaiveDate>,
    /// Restrict to one product; ignored when not a UUID
    pub product_id: Option<String>,
}

impl OverviewQuery {
    /// Resolved `(start, end)` range.
    pub fn window(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), AppError> {
        let end = self.end_date.unwrap_or(today);
        let start = self
            .start_date
            .unwrap_or(end - Duration::days(DEFAULT_WINDOW_DAYS));
        if start > end {
            return Err(AppError::bad_request("startDate must be on or before endDate"));
        }
        Ok((start, end))
    }

    pub fn product(&self) -> Option<Uuid> {
        self.product_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub views: i64,
    #[serde(rename = "engagedViews")]
    pub engaged_views: i64,
    #[serde(rename = "addsFrom3D")]
    pub adds_from_3d: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsTimeSeries {
    #[schema(example = "Views")]
    pub label: String,
    pub data: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopProduct {
    pub id: Uuid,
    pub name: String,
    pub views: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub summary: AnalyticsSummary,
    pub time_series: Vec<AnalyticsTimeSeries>,
    pub top_products: Vec<TopProduct>,
}

// ============================================================================
// Events
// ============================================================================

fn default_event_type() -> String {
    "view".to_string()
}

/// Event posted by an embedded viewer.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AnalyticsEventRequest {
    pub org_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub publish_link_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub session_id: Option<String>,
    #[serde(default = "default_event_type")]
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "view")]
    pub event_type: String,
    #[validate(length(max = 1000))]
    pub user_agent: Option<String>,
    #[validate(length(max = 128))]
    pub ip_hash: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventTracked {
    pub tracked: bool,
}

/// Daily rollup column bumped by an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyCounter {
    Views,
    Engaged,
    AddsFrom3d,
}

impl DailyCounter {
    pub fn for_event(event_type: &str) -> Option<Self> {
        match event_type.to_ascii_lowercase().as_str() {
            "view" | "page_view" | "model_view" => Some(Self::Views),
            "engaged" | "engagement" | "interaction" | "rotate" | "zoom" | "ar_view" => {
                Some(Self::Engaged)
            }
            "add_to_cart" | "add_from_3d" | "adds_from_3d" => Some(Self::AddsFrom3d),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Engaged => "engaged",
            Self::AddsFrom3d => "adds_from_3d",
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResumeCard {
    pub product_id: Uuid,
    pub product_name: String,
    pub status: String,
    pub thumbnail_url: Option<String>,
    /// 0..=100
    pub progress: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InsightCard {
    /// `views`, `engagement` or `topProduct`
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: String,
    pub change: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardOverview {
    pub resume: Vec<ResumeCard>,
    pub insights: Vec<InsightCard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_defaults_to_last_30_days() {
        let today = day(2024, 3, 31);
        let (start, end) = OverviewQuery::default().window(today).unwrap();
        assert_eq!(end, today);
        assert_eq!(start, day(2024, 3, 1));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let query = OverviewQuery {
            start_date: Some(day(2024, 5, 2)),
            end_date: Some(day(2024, 5, 1)),
            product_id: None,
        };
        assert!(query.window(day(2024, 6, 1)).is_err());
    }

    #[test]
    fn test_product_filter_ignores_garbage() {
        let id = Uuid::new_v4();
        let query = OverviewQuery {
            product_id: Some(id.to_string()),
            ..Default::default()
        };
        assert_eq!(query.product(), Some(id));
        let garbage = OverviewQuery {
            product_id: Some("chair".into()),
            ..Default::default()
        };
        assert_eq!(garbage.product(), None);
    }

    #[test]
    fn test_event_defaults_and_counters() {
        let event: AnalyticsEventRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(event.event_type, "view");
        assert!(event.payload.is_empty());

        assert_eq!(DailyCounter::for_event("VIEW"), Some(DailyCounter::Views));
        assert_eq!(DailyCounter::for_event("add_to_cart").map(DailyCounter::column), Some("adds_from_3d"));
        assert_eq!(DailyCounter::for_event("scroll"), None);
    }

    #[test]
    fn test_summary_wire_names() {
        let json = serde_json::to_value(AnalyticsSummary {
            views: 10,
            engaged_views: 4,
            adds_from_3d: 1,
        })
        .unwrap();
        assert_eq!(json["engagedViews"], 4);
        assert_eq!(json["addsFrom3D"], 1);
    }
}
