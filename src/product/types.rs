//! Product DTOs and the status lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::reference::BackgroundResponse;
use crate::gateway::types::HEX_COLOR;
use crate::product_link::{LinkInput, ProductLinkResponse};

pub const DEFAULT_ACCENT_COLOR: &str = "#2563EB";

/// Asset kind ids of `tbl_asset`
pub const ASSET_KIND_IMAGE: i32 = 1;
pub const ASSET_KIND_MESH: i32 = 2;
pub const ASSET_KIND_BACKGROUND_REMOVED: i32 = 11;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Processing,
    Ready,
    Published,
    Unpublished,
    Archived,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Published => "published",
            Self::Unpublished => "unpublished",
            Self::Archived => "archived",
        }
    }

    /// Only products with a finished model may be published.
    pub fn can_publish(self) -> bool {
        matches!(self, Self::Ready | Self::Published)
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "published" => Ok(Self::Published),
            "unpublished" => Ok(Self::Unpublished),
            "archived" => Ok(Self::Archived),
            other => Err(format!("Unknown product status: {}", other)),
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[validate(length(max = 200))]
    pub q: Option<String>,
    pub status: Option<ProductStatus>,
    /// `-createdAt` (default), `createdAt`, `updatedAt`, `name`, `status`; `-` sorts descending
    pub sort: Option<String>,
}

/// `ORDER BY` clause for a sort key; unknown keys fall back to newest first.
pub fn order_clause(sort: Option<&str>) -> String {
    let sort = sort.unwrap_or("-createdAt");
    let (field, descending) = match sort.strip_prefix('-') {
        Some(field) => (field, true),
        None => (sort, false),
    };
    let column = match field {
        "createdAt" => "created_date",
        "updatedAt" => "updated_date",
        "name" => "name",
        "status" => "status",
        _ => return "created_date DESC".to_string(),
    };
    format!("{} {}", column, if descending { "DESC" } else { "ASC" })
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProductCreate {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Lounge Chair")]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub accent_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub accent_overlay: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub accent_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub accent_overlay: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
}

impl From<ProductCreate> for ProductUpdate {
    fn from(c: ProductCreate) -> Self {
        Self {
            name: Some(c.name),
            description: c.description,
            brand: c.brand,
            accent_color: c.accent_color,
            accent_overlay: c.accent_overlay,
            tags: c.tags,
        }
    }
}

/// Configurator payload, stored verbatim
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema, PartialEq)]
pub struct ConfiguratorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub materials: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub variants: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub hotspots: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub links: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub settings: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ConfiguratorSettings {
    /// Fields present in `patch` replace those stored.
    pub fn merge(&mut self, patch: ConfiguratorSettings) {
        if patch.materials.is_some() {
            self.materials = patch.materials;
        }
        if patch.variants.is_some() {
            self.variants = patch.variants;
        }
        if patch.hotspots.is_some() {
            self.hotspots = patch.hotspots;
        }
        if patch.links.is_some() {
            self.links = patch.links;
        }
        if patch.settings.is_some() {
            self.settings = patch.settings;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PublishRequest {
    pub publish: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ProductDetailsUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Stored as an integer amount; fractions are truncated
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub currency_type: Option<i32>,
    pub backgroundid: Option<i32>,
    #[validate(nested)]
    pub links: Option<Vec<LinkInput>>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub accent_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_overlay: Option<String>,
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configurator: Option<ConfiguratorSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ProductLinkResponse>>,
    /// Set by `POST /createProduct`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_blob_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetailsResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency_type: Option<i32>,
    pub background_type: Option<i32>,
    pub backgroundid: Option<i32>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ProductLinkResponse>>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ProductImageItem {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Everything a viewer needs to render a product
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductAssetsData {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency_type: Option<i32>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub meshurl: Option<String>,
    pub images: Vec<ProductImageItem>,
    pub background: Option<BackgroundResponse>,
    pub links: Option<Vec<ProductLinkResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub dimensions: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductStatusData {
    pub id: Uuid,
    pub name: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `GET /products/{id}/status`: the assets view once ready
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ProductStatusView {
    Ready(ProductAssetsData),
    Pending(ProductStatusData),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductWithPrimaryAsset {
    pub id: Uuid,
    pub name: String,
    pub status: ProductStatus,
    pub image: Option<String>,
    pub asset_type: Option<String>,
    pub asset_type_id: Option<i32>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency_type: Option<i32>,
    pub background_type: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trip_and_publishability() {
        assert_eq!("ready".parse::<ProductStatus>().unwrap(), ProductStatus::Ready);
        assert!("done".parse::<ProductStatus>().is_err());
        assert!(ProductStatus::Ready.can_publish());
        assert!(ProductStatus::Published.can_publish());
        assert!(!ProductStatus::Processing.can_publish());
        assert_eq!(serde_json::to_value(ProductStatus::Unpublished).unwrap(), "unpublished");
    }

    #[test]
    fn test_order_clause() {
        assert_eq!(order_clause(None), "created_date DESC");
        assert_eq!(order_clause(Some("name")), "name ASC");
        assert_eq!(order_clause(Some("-updatedAt")), "updated_date DESC");
        assert_eq!(order_clause(Some("price; DROP TABLE x")), "created_date DESC");
    }

    #[test]
    fn test_create_validation() {
        let ok: ProductCreate = serde_json::from_value(json!({
            "name": "Chair", "accent_color": "#112233", "tags": ["a", "b"]
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: ProductCreate =
            serde_json::from_value(json!({"name": "", "accent_color": "red"})).unwrap();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("accent_color"));

        let too_many_tags: ProductCreate = serde_json::from_value(json!({
            "name": "Chair", "tags": vec!["t"; 21]
        }))
        .unwrap();
        assert!(too_many_tags.validate().is_err());
    }

    #[test]
    fn test_configurator_merge() {
        let mut stored: ConfiguratorSettings =
            serde_json::from_value(json!({"notes": "old", "materials": [{"name": "oak"}]})).unwrap();
        let patch: ConfiguratorSettings =
            serde_json::from_value(json!({"notes": "new", "settings": {"autoRotate": true}}))
                .unwrap();
        stored.merge(patch);
        assert_eq!(stored.notes.as_deref(), Some("new"));
        assert_eq!(stored.materials.as_ref().map(Vec::len), Some(1));
        assert_eq!(stored.settings.unwrap()["autoRotate"], true);
    }

    #[test]
    fn test_status_view_is_untagged() {
        let now = Utc::now();
        let view = ProductStatusView::Pending(ProductStatusData {
            id: Uuid::nil(),
            name: "Chair".into(),
            status: ProductStatus::Processing,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("Pending").is_none());
    }
}
