use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use geocascade_services::{BoundingBox, Centroid, Gazetteer, GazetteerPlace, MatchRecord};
use itertools::Itertools;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::push_parent;
use crate::{
    context::{Clean, RequestContext},
    pipeline::{StageEffect, StageError},
    predicates::ADMIN_PARSED_FIELDS,
};

const GAZETTEER_SOURCE: &str = "whosonfirst";

/// Administrative-area lookup against the gazetteer.
///
/// Runs in two modes. Geodisambiguation (`geometric_filters = true`) resolves an admin-only
/// query and honours the request's boundary filters. Id lookup resolves the admin parents
/// of a parsed street so the backend can be searched by id afterwards.
pub struct Placeholder {
    gazetteer: Arc<dyn Gazetteer>,
    geometric_filters: bool,
}

impl Placeholder {
    pub fn new(gazetteer: Arc<dyn Gazetteer>, geometric_filters: bool) -> Self {
        Self {
            gazetteer,
            geometric_filters,
        }
    }
}

/// With a parsed street only the admin parts are looked up, otherwise the full text.
fn lookup_text(clean: &Clean) -> Option<String> {
    if let Some(parsed) = clean.parsed_text.as_ref().filter(|p| p.has("street")) {
        let admin = ADMIN_PARSED_FIELDS
            .iter()
            .filter_map(|field| parsed.get(field))
            .join(" ");
        if !admin.is_empty() {
            return Some(admin);
        }
    }
    clean.text.clone()
}

fn to_record(place: &GazetteerPlace) -> MatchRecord {
    let mut record = MatchRecord::new(GAZETTEER_SOURCE, &place.placetype, place.id.to_string())
        .with_name(&place.name);
    record.match_type = Some("fallback".to_string());

    if let Some(geom) = &place.geom {
        record.center_point = Some(Centroid::new(geom.lat, geom.lon));
        if let Some(bbox) = geom.bbox.as_deref().and_then(BoundingBox::from_csv) {
            record = record.with_bounding_box(bbox);
        }
    }
    if let Some(population) = place.population {
        record
            .details
            .insert("population".to_string(), Value::from(population));
    }

    let mut parent = Map::new();
    for lineage in &place.lineage {
        for (placetype, entry) in lineage {
            push_parent(
                &mut parent,
                placetype,
                &entry.name,
                &entry.id.to_string(),
                entry.abbr.as_deref(),
            );
        }
    }
    record.parent = parent;
    record
}

fn passes_geometric_filters(record: &MatchRecord, clean: &Clean) -> bool {
    if let Some(country) = &clean.boundary_country {
        let in_country = record
            .parent
            .get("country_a")
            .and_then(Value::as_array)
            .is_some_and(|codes| codes.iter().any(|c| c.as_str() == Some(country.as_str())));
        if !in_country {
            return false;
        }
    }
    if let Some(rect) = &clean.boundary_rect {
        if !record.center_point.is_some_and(|c| rect.contains(&c)) {
            return false;
        }
    }
    true
}

#[async_trait]
impl StageEffect for Placeholder {
    #[instrument(name = "Placeholder", level = "debug", skip_all, fields(geometric_filters = self.geometric_filters))]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(text) = lookup_text(&ctx.clean) else {
            debug!("Nothing to look up");
            return Ok(());
        };
        let t = Instant::now();

        let places = match self.gazetteer.search(&text, ctx.clean.lang.as_deref()).await {
            Ok(places) => places,
            Err(e) => {
                ctx.push_error(e.to_string());
                return Ok(());
            }
        };

        let layers = ctx.clean.layers.as_ref();
        let records = places
            .iter()
            .map(to_record)
            .filter(|r| layers.is_none_or(|layers| layers.contains(&r.layer)))
            .filter(|r| !self.geometric_filters || passes_geometric_filters(r, &ctx.clean))
            .collect::<Vec<_>>();

        info!(
            text = %text,
            candidates = places.len(),
            result_count = records.len(),
            elapsed_ms = ?t.elapsed(),
            "Gazetteer lookup complete"
        );
        if !records.is_empty() {
            ctx.data = records;
            ctx.meta.set_query_type("fallback");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geocascade_services::{GazetteerGeometry, LineageEntry, memory::MemoryGazetteer};
    use serde_json::json;

    use super::*;
    use crate::context::ParsedText;

    fn springfield(id: u64, country: &str) -> GazetteerPlace {
        GazetteerPlace {
            id,
            name: "Springfield".to_string(),
            placetype: "locality".to_string(),
            population: Some(160_000),
            lineage: vec![BTreeMap::from([
                (
                    "locality".to_string(),
                    LineageEntry {
                        id,
                        name: "Springfield".to_string(),
                        abbr: None,
                    },
                ),
                (
                    "country".to_string(),
                    LineageEntry {
                        id: 1,
                        name: "Somewhere".to_string(),
                        abbr: Some(country.to_string()),
                    },
                ),
            ])],
            geom: Some(GazetteerGeometry {
                bbox: Some("-89.8,39.6,-89.5,39.9".to_string()),
                lat: 39.78,
                lon: -89.65,
            }),
        }
    }

    #[tokio::test]
    async fn test_id_lookup_uses_admin_parts() {
        let gazetteer = Arc::new(MemoryGazetteer::new(vec![springfield(101, "USA")]));
        let effect = Placeholder::new(gazetteer.clone(), false);
        let parsed: ParsedText = [("street", "Main St"), ("city", "Springfield")]
            .into_iter()
            .collect();
        let mut ctx = RequestContext::new(
            Clean::new(10)
                .with_text("Main St, Springfield")
                .with_parsed_text(parsed),
        );

        effect.apply(&mut ctx).await.unwrap();

        assert_eq!(gazetteer.calls()[0].0, "Springfield");
        assert_eq!(ctx.data.len(), 1);
        let record = &ctx.data[0];
        assert_eq!(record.gid, "whosonfirst:locality:101");
        assert_eq!(record.parent["country_a"], json!(["USA"]));
        assert!(record.bounding_box().is_some());
        assert_eq!(ctx.meta.query_type(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_geometric_filters_apply_only_in_disambiguation_mode() {
        let places = vec![springfield(101, "USA"), springfield(102, "AUS")];
        let clean = || {
            let mut clean = Clean::new(10).with_text("Springfield");
            clean.boundary_country = Some("AUS".to_string());
            clean
        };

        let mut ctx = RequestContext::new(clean());
        Placeholder::new(Arc::new(MemoryGazetteer::new(places.clone())), true)
            .apply(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.data.len(), 1);
        assert_eq!(ctx.data[0].id(), "102");

        let mut ctx = RequestContext::new(clean());
        Placeholder::new(Arc::new(MemoryGazetteer::new(places)), false)
            .apply(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.data.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let effect = Placeholder::new(Arc::new(MemoryGazetteer::default().failing("timeout")), true);
        let mut ctx = RequestContext::new(Clean::new(10).with_text("Springfield"));

        effect.apply(&mut ctx).await.unwrap();

        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.data.is_empty());
    }

    #[tokio::test]
    async fn test_layer_filter_always_applies() {
        let effect = Placeholder::new(
            Arc::new(MemoryGazetteer::new(vec![springfield(101, "USA")])),
            false,
        );
        let mut ctx =
            RequestContext::new(Clean::new(10).with_text("Springfield").with_layers(&["country"]));

        effect.apply(&mut ctx).await.unwrap();

        assert!(ctx.data.is_empty());
    }
}
