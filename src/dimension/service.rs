use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::{Map, Value, json};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::repository::{DimensionRepository, DimensionRow, NewDimension};
use super::types::*;
use crate::activity::{ActivityEntry, ActivityService, RequestMeta};
use crate::error::AppError;
use crate::hotspot::{DIMENSION_MARKER_PREFIX, HotspotFields, HotspotRepository, HotspotRow};
use crate::product::ProductRepository;

fn stored_value(value: f64) -> Result<Decimal, AppError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| AppError::bad_request(format!("Invalid dimension value: {}", value)))
}

fn hotspot_view(row: &HotspotRow, kind: Option<&str>) -> DimensionHotspotView {
    DimensionHotspotView {
        id: row.id,
        kind: kind.map(str::to_string),
        title: row.label.clone(),
        position: row.position,
    }
}

/// Start then end markers of a dimension; missing hotspots are skipped.
fn endpoint_views(
    dim: &DimensionRow,
    hotspots: &HashMap<Uuid, HotspotRow>,
    typed: bool,
) -> Vec<DimensionHotspotView> {
    [(dim.start_hotspot_id, "start"), (dim.end_hotspot_id, "end")]
        .into_iter()
        .filter_map(|(id, kind)| {
            let row = hotspots.get(&id?)?;
            Some(hotspot_view(row, typed.then_some(kind)))
        })
        .collect()
}

/// `{dimensions: {<key>: {value, unit, hotspots}, dimension_name}}`; the first
/// dimension of each key wins.
pub fn keyed_form(
    group_name: &str,
    dims: &[DimensionRow],
    hotspots: &HashMap<Uuid, HotspotRow>,
) -> Option<Value> {
    let mut seen = HashSet::new();
    let mut keyed = Map::new();
    for dim in dims {
        let key = dim.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        keyed.insert(
            key,
            json!({
                "value": dim.value.to_f64().unwrap_or_default(),
                "unit": dim.unit,
                "hotspots": endpoint_views(dim, hotspots, false),
            }),
        );
    }
    if keyed.is_empty() {
        return None;
    }
    keyed.insert("dimension_name".into(), Value::String(group_name.to_string()));
    Some(json!({ "dimensions": keyed }))
}

async fn hotspots_of(pool: &PgPool, dims: &[DimensionRow]) -> Result<HashMap<Uuid, HotspotRow>, sqlx::Error> {
    let ids: Vec<Uuid> = dims
        .iter()
        .flat_map(|d| [d.start_hotspot_id, d.end_hotspot_id])
        .flatten()
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = HotspotRepository::find_many(pool, &ids).await?;
    Ok(rows.into_iter().map(|h| (h.id, h)).collect())
}

pub struct DimensionService;

impl DimensionService {
    async fn ensure_product(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if ProductRepository::exists_owned(pool, product_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Product not found"))
        }
    }

    /// Replace every dimension of the product with `items`.
    pub async fn save(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
        items: &[DimensionItem],
        meta: &RequestMeta,
    ) -> Result<DimensionAck, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        let mut tx = pool.begin().await?;
        DimensionRepository::delete_existing(&mut tx, product_id).await?;
        let mut order = HotspotRepository::next_order_index(&mut tx, product_id).await?;
        let group_id = DimensionRepository::create_group(&mut tx, product_id, GROUP_NAME, user_id).await?;

        for item in items {
            let (start, end) = item.endpoints().map_err(AppError::BadRequest)?;
            let value = stored_value(item.value)?;

            let start_label = format!("{}{}", DIMENSION_MARKER_PREFIX, start.title);
            let start_row = HotspotRepository::insert(
                &mut tx,
                product_id,
                &HotspotFields::marker(&start.title, &start_label, start.position),
                order,
                user_id,
            )
            .await?;
            let end_label = format!("{}{}", DIMENSION_MARKER_PREFIX, end.title);
            let end_row = HotspotRepository::insert(
                &mut tx,
                product_id,
                &HotspotFields::marker(&end.title, &end_label, end.position),
                order + 1,
                user_id,
            )
            .await?;

            DimensionRepository::insert(
                &mut tx,
                &NewDimension {
                    product_id,
                    group_id,
                    name: &item.name,
                    value,
                    unit: item.unit(),
                    start_hotspot_id: start_row.id,
                    end_hotspot_id: end_row.id,
                    order_index: order,
                    created_by: user_id,
                },
            )
            .await?;
            order += 2;
        }
        tx.commit().await?;

        tracing::info!(%product_id, count = items.len(), "Dimensions saved");
        ActivityService::log(
            pool,
            ActivityEntry::product("product.dimensions_updated", user_id, product_id),
            meta,
        )
        .await;
        Ok(DimensionAck {
            product_id,
            message: "Dimensions saved successfully".into(),
        })
    }

    /// Dimensions in the shape they were saved in, with `type` on each hotspot.
    pub async fn list(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<DimensionView>, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        let mut result = Vec::new();
        for group in DimensionRepository::groups(pool, product_id).await? {
            let dims = DimensionRepository::by_group(pool, group.id).await?;
            let hotspots = hotspots_of(pool, &dims).await?;
            result.extend(dims.iter().map(|dim| DimensionView {
                name: dim.display_name(),
                value: dim.value.to_f64().unwrap_or_default(),
                unit: dim.unit.clone(),
                hotspots: endpoint_views(dim, &hotspots, true),
            }));
        }
        Ok(result)
    }

    pub async fn delete(
        pool: &PgPool,
        product_id: Uuid,
        user_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<DimensionAck, AppError> {
        Self::ensure_product(pool, product_id, user_id).await?;
        let mut tx = pool.begin().await?;
        DimensionRepository::delete_existing(&mut tx, product_id).await?;
        tx.commit().await?;

        tracing::info!(%product_id, "Dimensions deleted");
        ActivityService::log(
            pool,
            ActivityEntry::product("product.dimensions_deleted", user_id, product_id),
            meta,
        )
        .await;
        Ok(DimensionAck {
            product_id,
            message: "Dimensions deleted successfully".into(),
        })
    }

    /// Keyed form of the first group, embedded in the viewer payload.
    pub async fn keyed_view(pool: &PgPool, product_id: Uuid) -> Result<Option<Value>, sqlx::Error> {
        let groups = DimensionRepository::groups(pool, product_id).await?;
        let Some(group) = groups.first() else {
            return Ok(None);
        };
        let dims = DimensionRepository::by_group(pool, group.id).await?;
        if dims.is_empty() {
            return Ok(None);
        }
        let hotspots = hotspots_of(pool, &dims).await?;
        Ok(keyed_form(&group.name, &dims, &hotspots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotspot::HotspotPosition;
    use crate::hotspot::types::HotspotAction;
    use chrono::Utc;

    fn hotspot(label: &str, x: f64) -> HotspotRow {
        HotspotRow {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            label: label.into(),
            description: Some(format!("{}{}", DIMENSION_MARKER_PREFIX, label)),
            position: HotspotPosition { x, y: 0.0, z: 0.0 },
            text_font: None,
            text_color: None,
            bg_color: None,
            action_type: HotspotAction::None,
            action_payload: None,
            order_index: 0,
            hotspot_type: None,
            created_at: Utc::now(),
        }
    }

    fn dim(name: &str, value: Decimal, start: &HotspotRow, end: &HotspotRow) -> DimensionRow {
        DimensionRow {
            dimension_type: None,
            dimension_name: Some(name.into()),
            value,
            unit: "cm".into(),
            start_hotspot_id: Some(start.id),
            end_hotspot_id: Some(end.id),
        }
    }

    #[test]
    fn test_keyed_form_shape() {
        let (l, r) = (hotspot("Left", -0.5), hotspot("Right", 0.5));
        let dims = vec![
            dim("Width", Decimal::new(8050, 2), &l, &r),
            dim("width", Decimal::new(1, 0), &r, &l),
        ];
        let hotspots: HashMap<_, _> = [(l.id, l.clone()), (r.id, r.clone())].into_iter().collect();

        let view = keyed_form(GROUP_NAME, &dims, &hotspots).unwrap();
        let dimensions = &view["dimensions"];
        assert_eq!(dimensions["dimension_name"], GROUP_NAME);
        assert_eq!(dimensions["width"]["value"], 80.5);
        assert_eq!(dimensions["width"]["unit"], "cm");
        let markers = dimensions["width"]["hotspots"].as_array().unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0]["title"], "Left");
        assert!(markers[0].get("type").is_none());
    }

    #[test]
    fn test_keyed_form_empty() {
        assert!(keyed_form(GROUP_NAME, &[], &HashMap::new()).is_none());
    }

    #[test]
    fn test_endpoint_views_skip_missing_hotspots() {
        let (l, r) = (hotspot("Left", -0.5), hotspot("Right", 0.5));
        let d = dim("Depth", Decimal::ONE, &l, &r);
        let only_left: HashMap<_, _> = [(l.id, l.clone())].into_iter().collect();
        let views = endpoint_views(&d, &only_left, true);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].kind.as_deref(), Some("start"));
    }

    #[test]
    fn test_stored_value_rounds_to_cents() {
        assert_eq!(stored_value(12.345).unwrap().to_string(), "12.34");
        assert!(stored_value(f64::NAN).is_err());
    }
}
