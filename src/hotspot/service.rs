use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::repository::{HotspotFields, HotspotRepository};
use super::types::{DIMENSION_HOTSPOT_TYPE, HotspotAction, HotspotPosition, HotspotResponse, HotspotUpsert};
use crate::error::AppError;
use crate::product::ProductRepository;

/// Reject positions outside the normalised cube.
pub fn validate_position(position: &HotspotPosition) -> Result<(), AppError> {
    match position.out_of_range() {
        Some((axis, value)) => Err(AppError::bad_request(format!(
            "Position {} must be between -1 and 1. Got: {}",
            axis, value
        ))),
        None => Ok(()),
    }
}

fn fields_of(req: &HotspotUpsert) -> HotspotFields<'_> {
    HotspotFields {
        label: &req.title,
        description: Some(&req.description),
        position: req.position,
        text_font: req.text_font.as_deref(),
        text_color: req.text_color.as_deref(),
        bg_color: req.bg_color.as_deref(),
        action_type: HotspotAction::parse_lenient(req.action_type.as_deref()),
        action_payload: (!req.action_payload.is_empty())
            .then(|| serde_json::Value::Object(req.action_payload.clone()).to_string()),
        hotspot_type: req.hotspot_type,
    }
}

pub struct HotspotService;

impl HotspotService {
    async fn ensure_product(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if ProductRepository::exists_owned(pool, product_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Product not found"))
        }
    }

    async fn is_dimension_type(
        conn: &mut PgConnection,
        type_id: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        let Some(type_id) = type_id else {
            return Ok(false);
        };
        let name = HotspotRepository::type_name(conn, type_id).await?;
        Ok(name.is_some_and(|n| n.eq_ignore_ascii_case(DIMENSION_HOTSPOT_TYPE)))
    }

    pub async fn list(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<HotspotResponse>, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        let rows = HotspotRepository::list_for_product(pool, product_id).await?;
        Ok(rows.into_iter().map(HotspotResponse::from).collect())
    }

    /// Create when `hotspot_id` is absent, otherwise update in place.
    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        req: &HotspotUpsert,
    ) -> Result<HotspotResponse, AppError> {
        Self::ensure_product(pool, req.product_id, user_id).await?;
        let mut tx = pool.begin().await?;

        let saved = match req.hotspot_id {
            None => {
                if Self::is_dimension_type(&mut tx, req.hotspot_type).await? {
                    return Err(AppError::bad_request(
                        "Creation of dimension hotspots is not allowed via this API. Use the dimensions endpoint instead.",
                    ));
                }
                validate_position(&req.position)?;
                let order = HotspotRepository::next_order_index(&mut tx, req.product_id).await?;
                let row =
                    HotspotRepository::insert(&mut tx, req.product_id, &fields_of(req), order, user_id)
                        .await?;
                tracing::info!(product_id = %req.product_id, hotspot_id = %row.id, "Hotspot created");
                row
            }
            Some(hotspot_id) => {
                let existing = HotspotRepository::find(&mut tx, hotspot_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Hotspot not found"))?;
                if existing.product_id != req.product_id {
                    return Err(AppError::bad_request("Hotspot does not belong to this product"));
                }
                if Self::is_dimension_type(&mut tx, req.hotspot_type).await? {
                    return Err(AppError::bad_request(
                        "Cannot set hotspot type to dimension via this API. Use the dimensions endpoint instead.",
                    ));
                }
                validate_position(&req.position)?;
                HotspotRepository::update(&mut tx, hotspot_id, &fields_of(req), user_id).await?
            }
        };
        tx.commit().await?;
        Ok(saved.into())
    }

    pub async fn delete(
        pool: &PgPool,
        product_id: Uuid,
        hotspot_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        let mut conn = pool.acquire().await?;
        let hotspot = HotspotRepository::find(&mut conn, hotspot_id)
            .await?
            .ok_or_else(|| AppError::not_found("Hotspot not found"))?;
        if hotspot.product_id != product_id {
            return Err(AppError::bad_request("Hotspot does not belong to this product"));
        }
        drop(conn);
        HotspotRepository::delete(pool, hotspot_id).await?;
        tracing::info!(%product_id, %hotspot_id, "Hotspot deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upsert() -> HotspotUpsert {
        serde_json::from_value(json!({
            "product_id": Uuid::new_v4(),
            "title": "Cushion",
            "description": "Memory foam",
            "position": {"x": 0.1, "y": 0.2, "z": -0.3},
            "action_type": "link",
            "action_payload": {"url": "https://example.com"}
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_position_message() {
        let err = validate_position(&HotspotPosition {
            x: 0.0,
            y: 0.0,
            z: -2.5,
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Position z must be between -1 and 1. Got: -2.5");
    }

    #[test]
    fn test_fields_serialize_payload() {
        let req = upsert();
        let fields = fields_of(&req);
        assert_eq!(fields.action_type, HotspotAction::Link);
        let payload: serde_json::Value =
            serde_json::from_str(fields.action_payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["url"], "https://example.com");
    }

    #[test]
    fn test_empty_payload_is_null() {
        let mut req = upsert();
        req.action_payload.clear();
        req.action_type = Some("spin".into());
        let fields = fields_of(&req);
        assert!(fields.action_payload.is_none());
        assert_eq!(fields.action_type, HotspotAction::None);
    }
}
