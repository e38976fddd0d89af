use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Name of the hotspot type reserved for dimension markers.
pub const DIMENSION_HOTSPOT_TYPE: &str = "dimension";

/// Point on the normalised model space, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HotspotPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl HotspotPosition {
    /// First axis outside `[-1, 1]`, as `(axis, value)`.
    pub fn out_of_range(&self) -> Option<(char, f64)> {
        [('x', self.x), ('y', self.y), ('z', self.z)]
            .into_iter()
            .find(|(_, v)| !(-1.0..=1.0).contains(v))
    }
}

/// What clicking a hotspot does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HotspotAction {
    #[default]
    None,
    Link,
    MaterialSwitch,
    VariantSwitch,
    TextOnly,
}

impl HotspotAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Link => "link",
            Self::MaterialSwitch => "material-switch",
            Self::VariantSwitch => "variant-switch",
            Self::TextOnly => "text-only",
        }
    }

    /// Unknown names become [`HotspotAction::None`].
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for HotspotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotspotAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "link" => Ok(Self::Link),
            "material-switch" => Ok(Self::MaterialSwitch),
            "variant-switch" => Ok(Self::VariantSwitch),
            "text-only" => Ok(Self::TextOnly),
            other => Err(format!("Unknown hotspot action: {}", other)),
        }
    }
}

/// Create (no `hotspot_id`) or update (with `hotspot_id`) a hotspot.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct HotspotUpsert {
    pub product_id: Uuid,
    pub hotspot_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: String,
    pub position: HotspotPosition,
    pub text_font: Option<String>,
    pub text_color: Option<String>,
    pub bg_color: Option<String>,
    /// `none`, `link`, `material-switch`, `variant-switch`, `text-only`
    #[schema(example = "link")]
    pub action_type: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub action_payload: Map<String, Value>,
    /// `tbl_hotspot_type.id`
    pub hotspot_type: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HotspotResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub position: HotspotPosition,
    pub text_font: Option<String>,
    pub text_color: Option<String>,
    pub bg_color: Option<String>,
    pub action_type: HotspotAction,
    #[schema(value_type = Object)]
    pub action_payload: Map<String, Value>,
    pub hotspot_type: Option<i32>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_range() {
        let inside = HotspotPosition {
            x: -1.0,
            y: 0.0,
            z: 1.0,
        };
        assert!(inside.out_of_range().is_none());

        let outside = HotspotPosition { y: 1.5, ..inside };
        assert_eq!(outside.out_of_range(), Some(('y', 1.5)));
    }

    #[test]
    fn test_action_parse_falls_back_to_none() {
        assert_eq!(HotspotAction::parse_lenient(Some("material-switch")), HotspotAction::MaterialSwitch);
        assert_eq!(HotspotAction::parse_lenient(Some("teleport")), HotspotAction::None);
        assert_eq!(HotspotAction::parse_lenient(None), HotspotAction::None);
    }

    #[test]
    fn test_action_serializes_kebab_case() {
        let json = serde_json::to_value(HotspotAction::VariantSwitch).unwrap();
        assert_eq!(json, "variant-switch");
        assert_eq!(HotspotAction::TextOnly.to_string(), "text-only");
    }
}
