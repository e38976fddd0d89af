use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::hotspot::HotspotPosition;

pub const DEFAULT_UNIT: &str = "cm";
/// Name of the group every saved set of dimensions is filed under.
pub const GROUP_NAME: &str = "Product Measurements";

/// One end of a measurement.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DimensionHotspotInput {
    /// `start` or `end`
    #[serde(rename = "type")]
    #[schema(example = "start")]
    pub kind: String,
    pub title: String,
    pub position: HotspotPosition,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DimensionItem {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Seat Width")]
    pub name: String,
    pub value: f64,
    #[validate(length(max = 20))]
    pub unit: Option<String>,
    pub hotspots: Vec<DimensionHotspotInput>,
}

impl DimensionItem {
    /// The start and end markers; exactly two hotspots, one of each kind.
    pub fn endpoints(&self) -> Result<(&DimensionHotspotInput, &DimensionHotspotInput), String> {
        if self.hotspots.len() != 2 {
            return Err(format!("Dimension '{}' must have exactly 2 hotspots", self.name));
        }
        let start = self.hotspots.iter().find(|h| h.kind == "start");
        let end = self.hotspots.iter().find(|h| h.kind == "end");
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(format!(
                "Dimension '{}' must have both 'start' and 'end' hotspots",
                self.name
            )),
        }
    }

    pub fn unit(&self) -> &str {
        self.unit.as_deref().filter(|u| !u.is_empty()).unwrap_or(DEFAULT_UNIT)
    }
}

/// Request body of the save endpoints: a JSON array of dimensions.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DimensionsPayload(pub Vec<DimensionItem>);

impl Validate for DimensionsPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        for item in &self.0 {
            item.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DimensionAck {
    pub product_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct DimensionHotspotView {
    pub id: Uuid,
    /// `start` or `end`; only present in the list form
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub title: String,
    pub position: HotspotPosition,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct DimensionView {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub hotspots: Vec<DimensionHotspotView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> DimensionItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_endpoints_require_start_and_end() {
        let ok = item(json!({
            "name": "Width", "value": 80.0,
            "hotspots": [
                {"type": "end", "title": "R", "position": {"x": 1.0, "y": 0.0, "z": 0.0}},
                {"type": "start", "title": "L", "position": {"x": -1.0, "y": 0.0, "z": 0.0}}
            ]
        }));
        let (start, end) = ok.endpoints().unwrap();
        assert_eq!(start.title, "L");
        assert_eq!(end.title, "R");
        assert_eq!(ok.unit(), "cm");

        let twice_start = item(json!({
            "name": "Depth", "value": 1.0, "unit": "in",
            "hotspots": [
                {"type": "start", "title": "A", "position": {"x": 0.0, "y": 0.0, "z": 0.0}},
                {"type": "start", "title": "B", "position": {"x": 0.0, "y": 0.0, "z": 0.0}}
            ]
        }));
        assert_eq!(
            twice_start.endpoints().unwrap_err(),
            "Dimension 'Depth' must have both 'start' and 'end' hotspots"
        );
        assert_eq!(twice_start.unit(), "in");
    }

    #[test]
    fn test_endpoints_require_two_hotspots() {
        let single = item(json!({
            "name": "Height", "value": 2.0,
            "hotspots": [{"type": "start", "title": "A", "position": {"x": 0.0, "y": 0.0, "z": 0.0}}]
        }));
        assert_eq!(
            single.endpoints().unwrap_err(),
            "Dimension 'Height' must have exactly 2 hotspots"
        );
    }

    #[test]
    fn test_payload_is_a_bare_array() {
        let payload: DimensionsPayload = serde_json::from_value(json!([
            {"name": "", "value": 1.0, "hotspots": []}
        ]))
        .unwrap();
        assert_eq!(payload.0.len(), 1);
        assert!(payload.validate().is_err());
    }
}
