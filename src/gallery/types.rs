use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::gateway::types::HEX_COLOR;

/// Prefix of the short gallery reference, `gallery-` + 8 hex digits.
pub const SHORT_ID_PREFIX: &str = "gallery-";

/// A gallery addressed by full id or by the first 8 hex digits of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryRef {
    Id(Uuid),
    Prefix(String),
}

impl GalleryRef {
    /// `None` for anything that cannot name a gallery.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let rest = raw.strip_prefix(SHORT_ID_PREFIX).unwrap_or(raw);
        if rest.len() > 8 {
            return Uuid::parse_str(rest).ok().map(Self::Id);
        }
        (rest.len() == 8 && rest.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| Self::Prefix(rest.to_ascii_lowercase()))
    }
}

/// `gallery-xxxxxxxx` for a gallery id.
pub fn short_id(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("{}{}", SHORT_ID_PREFIX, &simple[..8])
}

/// Presentation fields kept in the `settings` JSON column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GallerySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_overlay: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GalleryListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[validate(length(max = 200))]
    pub q: Option<String>,
    /// `-createdAt` (default), `createdAt`, `updatedAt`, `name`; `-` sorts descending
    pub sort: Option<String>,
}

/// `ORDER BY` clause for a gallery sort key.
pub fn order_clause(sort: Option<&str>) -> String {
    let sort = sort.unwrap_or("-createdAt");
    let (field, descending) = match sort.strip_prefix('-') {
        Some(field) => (field, true),
        None => (sort, false),
    };
    let column = match field {
        "createdAt" => "g.created_date",
        "updatedAt" => "g.updated_date",
        "name" => "g.name",
        _ => return "g.created_date DESC".to_string(),
    };
    format!("{} {}", column, if descending { "DESC" } else { "ASC" })
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryCreate {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Spring Collection")]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub thumbnail_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub thumbnail_overlay: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub thumbnail_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR))]
    pub thumbnail_overlay: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl From<GalleryCreate> for GalleryUpdate {
    fn from(c: GalleryCreate) -> Self {
        Self {
            name: Some(c.name),
            description: c.description,
            thumbnail_color: c.thumbnail_color,
            thumbnail_overlay: c.thumbnail_overlay,
            tags: c.tags,
            is_public: c.is_public,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryResponse {
    pub id: Uuid,
    /// `gallery-xxxxxxxx`, also accepted as a path id
    pub short_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail_color: Option<String>,
    pub thumbnail_overlay: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub product_count: i64,
    pub asset_count: i64,
    #[schema(example = "ready")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_ref_forms() {
        let id = Uuid::new_v4();
        assert_eq!(GalleryRef::parse(&id.to_string()), Some(GalleryRef::Id(id)));
        assert_eq!(
            GalleryRef::parse(&format!("gallery-{}", id)),
            Some(GalleryRef::Id(id))
        );

        let short = short_id(id);
        assert!(short.starts_with("gallery-"));
        assert_eq!(short.len(), 16);
        assert_eq!(
            GalleryRef::parse(&short),
            Some(GalleryRef::Prefix(id.simple().to_string()[..8].to_string()))
        );
    }

    #[test]
    fn test_gallery_ref_rejects_garbage() {
        assert!(GalleryRef::parse("gallery-").is_none());
        assert!(GalleryRef::parse("gallery-zzzzzzzz").is_none());
        assert!(GalleryRef::parse("gallery-1234").is_none());
        assert!(GalleryRef::parse("gallery-%%%%%%%%").is_none());
        assert!(GalleryRef::parse("not-a-uuid-at-all").is_none());
    }

    #[test]
    fn test_order_clause() {
        assert_eq!(order_clause(None), "g.created_date DESC");
        assert_eq!(order_clause(Some("name")), "g.name ASC");
        assert_eq!(order_clause(Some("-updatedAt")), "g.updated_date DESC");
        assert_eq!(order_clause(Some("status")), "g.created_date DESC");
    }
}
