use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use geocascade_services::{Centroid, InterpolatedPoint, Interpolator, MatchRecord};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

fn source_name(source: &str) -> &str {
    match source {
        "OA" => "openaddresses",
        "OSM" => "openstreetmap",
        "mixed" => "mixed",
        other => other,
    }
}

/// Turn a street hit into the interpolated address point.
fn to_address(street_record: &MatchRecord, street: &str, point: InterpolatedPoint) -> MatchRecord {
    let source = source_name(&point.source);
    let street_name = street_record
        .default_name()
        .unwrap_or_else(|| street.to_string());

    let mut record = MatchRecord::new(source, "address", &point.source_id)
        .with_name(format!("{} {street_name}", point.number));
    record.source_id = Some(point.source_id.clone());
    record.center_point = Some(Centroid::new(point.lat, point.lon));
    record.parent = street_record.parent.clone();
    record
        .address_parts
        .insert("number".to_string(), Value::from(point.number));
    record
        .address_parts
        .insert("street".to_string(), Value::from(street_name));
    record.match_type = Some(if source == "mixed" { "interpolated" } else { "exact" }.to_string());
    record.confidence = street_record.confidence;
    record.distance = street_record.distance;
    record
}

/// Replaces street hits with an interpolated address point for the parsed house number.
///
/// Calls are made one street at a time. A failed or empty lookup leaves the street hit as is.
pub struct Interpolate {
    interpolator: Arc<dyn Interpolator>,
}

impl Interpolate {
    pub fn new(interpolator: Arc<dyn Interpolator>) -> Self {
        Self { interpolator }
    }
}

#[async_trait]
impl StageEffect for Interpolate {
    #[instrument(name = "Interpolate", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let (Some(number), Some(street)) = (
            ctx.clean.parsed("number").map(ToString::to_string),
            ctx.clean.parsed("street").map(ToString::to_string),
        ) else {
            debug!("No number and street to interpolate");
            return Ok(());
        };
        let t = Instant::now();
        let mut interpolated = 0;

        for record in &mut ctx.data {
            if record.layer != "street" {
                continue;
            }
            let Some(near) = record.center_point else {
                continue;
            };
            match self.interpolator.interpolate(&street, &number, near).await {
                Ok(Some(point)) => {
                    let address = to_address(record, &street, point);
                    *record = address;
                    interpolated += 1;
                }
                Ok(None) => debug!(gid = %record.gid, "No interpolation result"),
                Err(e) => warn!(gid = %record.gid, error = %e, "Interpolation failed"),
            }
        }

        info!(interpolated, elapsed_ms = ?t.elapsed(), "Interpolation complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::memory::MemoryInterpolator;

    use super::*;
    use crate::context::{Clean, ParsedText};

    fn ctx() -> RequestContext {
        let parsed: ParsedText = [("number", "12"), ("street", "Main St")].into_iter().collect();
        let mut ctx = RequestContext::new(Clean::new(10).with_parsed_text(parsed));
        ctx.data = vec![
            MatchRecord::new("openstreetmap", "street", "1")
                .with_name("Main Street")
                .with_centroid(1.0, 1.0)
                .with_parent("locality", "Springfield", "5"),
            MatchRecord::new("openstreetmap", "venue", "2").with_centroid(1.0, 1.0),
        ];
        ctx
    }

    #[tokio::test]
    async fn test_street_becomes_address() {
        let interpolator = Arc::new(MemoryInterpolator::new(Some(InterpolatedPoint {
            number: "12".to_string(),
            source: "mixed".to_string(),
            source_id: "abc".to_string(),
            lat: 1.0001,
            lon: 1.0002,
        })));
        let mut ctx = ctx();

        Interpolate::new(interpolator.clone())
            .apply(&mut ctx)
            .await
            .unwrap();

        let address = &ctx.data[0];
        assert_eq!(address.gid, "mixed:address:abc");
        assert_eq!(address.default_name().as_deref(), Some("12 Main Street"));
        assert_eq!(address.match_type.as_deref(), Some("interpolated"));
        assert_eq!(address.parent_value("locality").as_deref(), Some("Springfield"));
        assert_eq!(ctx.data[1].layer, "venue");
        assert_eq!(
            interpolator.calls(),
            vec![("Main St".to_string(), "12".to_string())],
            "only street hits are interpolated"
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_street() {
        let mut ctx = ctx();
        Interpolate::new(Arc::new(MemoryInterpolator::default().failing("down")))
            .apply(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.data[0].layer, "street");
        assert!(ctx.errors.is_empty());
    }
}
