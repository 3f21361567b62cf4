use std::sync::Arc;

use async_trait::async_trait;
use geocascade_services::{ADMIN_LAYERS, BoundingBox, MatchRecord, PipArea, PointInPolygon};
use serde_json::Map;
use tracing::{debug, info, instrument};

use super::push_parent;
use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

/// Reverse geocoding by administrative containment.
///
/// The most granular requested layer that contains the point becomes the result; every
/// coarser layer found becomes one of its parents.
pub struct CoarseReverse {
    pip: Arc<dyn PointInPolygon>,
}

impl CoarseReverse {
    pub fn new(pip: Arc<dyn PointInPolygon>) -> Self {
        Self { pip }
    }
}

fn to_record(layer: &str, area: &PipArea, parents: &[(&str, &PipArea)]) -> MatchRecord {
    let mut record =
        MatchRecord::new("whosonfirst", layer, area.id.to_string()).with_name(&area.name);
    record.center_point = area.centroid;
    if let Some(bbox) = area.bounding_box.as_deref().and_then(BoundingBox::from_csv) {
        record = record.with_bounding_box(bbox);
    }
    let mut parent = Map::new();
    for (parent_layer, parent_area) in parents {
        push_parent(
            &mut parent,
            parent_layer,
            &parent_area.name,
            &parent_area.id.to_string(),
            parent_area.abbr.as_deref(),
        );
    }
    record.parent = parent;
    record
}

#[async_trait]
impl StageEffect for CoarseReverse {
    #[instrument(name = "Coarse reverse", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(point) = ctx.clean.point else {
            debug!("No point to look up");
            return Ok(());
        };

        let areas = match self.pip.lookup(point, ctx.clean.layers.as_deref()).await {
            Ok(areas) => areas,
            Err(e) => {
                ctx.push_error(e.to_string());
                return Ok(());
            }
        };

        // most granular first
        let found = ADMIN_LAYERS
            .iter()
            .filter_map(|layer| {
                areas
                    .get(*layer)
                    .and_then(|a| a.first())
                    .map(|area| (*layer, area))
            })
            .collect::<Vec<_>>();

        let requested = ctx.clean.layers.as_ref();
        let Some(position) = found
            .iter()
            .position(|(layer, _)| requested.is_none_or(|r| r.iter().any(|l| l.as_str() == *layer)))
        else {
            info!(result_count = 0, "Coarse reverse found no containing area");
            return Ok(());
        };

        let (layer, area) = found[position];
        let mut record = to_record(layer, area, &found[position..]);
        if record.center_point.is_none() {
            record.center_point = Some(point);
        }
        info!(layer, id = area.id, "Coarse reverse complete");
        ctx.data = vec![record];
        ctx.meta.set_query_type("reverse");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geocascade_services::{Centroid, memory::MemoryPip};
    use serde_json::json;

    use super::*;
    use crate::context::Clean;

    fn area(id: u64, name: &str, abbr: Option<&str>) -> PipArea {
        PipArea {
            id,
            name: name.to_string(),
            abbr: abbr.map(ToString::to_string),
            centroid: None,
            bounding_box: None,
        }
    }

    fn pip() -> MemoryPip {
        MemoryPip::new(BTreeMap::from([
            ("locality".to_string(), vec![area(1, "Berlin", None)]),
            ("region".to_string(), vec![area(2, "Berlin", Some("BE"))]),
            ("country".to_string(), vec![area(3, "Germany", Some("DEU"))]),
        ]))
    }

    #[tokio::test]
    async fn test_most_granular_requested_layer_wins() {
        let mut ctx = RequestContext::new(
            Clean::new(10)
                .with_point(52.52, 13.40)
                .with_layers(&["region", "country"]),
        );

        CoarseReverse::new(Arc::new(pip())).apply(&mut ctx).await.unwrap();

        assert_eq!(ctx.data.len(), 1);
        let record = &ctx.data[0];
        assert_eq!(record.gid, "whosonfirst:region:2");
        assert_eq!(record.center_point, Some(Centroid::new(52.52, 13.40)));
        assert_eq!(record.parent["region_a"], json!(["BE"]));
        assert_eq!(record.parent["country"], json!(["Germany"]));
        assert!(record.parent.get("locality").is_none());
    }

    #[tokio::test]
    async fn test_no_layers_uses_most_granular() {
        let mut ctx = RequestContext::new(Clean::new(10).with_point(52.52, 13.40));

        CoarseReverse::new(Arc::new(pip())).apply(&mut ctx).await.unwrap();

        assert_eq!(ctx.data[0].layer, "locality");
        assert_eq!(ctx.data[0].parent["country_id"], json!(["3"]));
    }

    #[tokio::test]
    async fn test_pip_failure_is_recorded() {
        let mut ctx = RequestContext::new(Clean::new(10).with_point(0.0, 0.0));

        CoarseReverse::new(Arc::new(MemoryPip::default().failing("pip down")))
            .apply(&mut ctx)
            .await
            .unwrap();

        assert!(ctx.data.is_empty());
        assert_eq!(ctx.errors.len(), 1);
    }
}
