//! Assembly of the final match set into a GeoJSON feature collection.
//!
//! The assembler never mutates its input: the same records and parameters always produce
//! the same collection. Per-record problems (no centroid, undecodable addendum, missing
//! name) are logged and isolated to that record; a failed extent computation only drops
//! the top-level `bbox`.

mod details;
mod envelope;

pub use details::collect_details;
pub use envelope::{Engine, GeocodeJson, GeocodeResponse, Geocoding, Responder};

use geo::{BoundingRect, MultiPoint, Point};
use geocascade_services::{BoundingBox, BoundingBoxField, Gid, MatchRecord};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::{
    context::Clean,
    sanitizer::{GeometrySet, parse_geometries},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    pub geometry: Value,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: "FeatureCollection",
            features: Vec::new(),
            bbox: None,
        }
    }
}

/// Parsed or still encoded, the record's bounding box if it has a usable one.
fn record_bbox(record: &MatchRecord) -> Option<BoundingBox> {
    match &record.bounding_box {
        Some(BoundingBoxField::Parsed(bbox)) => Some(*bbox),
        Some(BoundingBoxField::Encoded(encoded)) => serde_json::from_str(encoded).ok(),
        None => None,
    }
}

fn decode_addendum(record: &MatchRecord) -> Map<String, Value> {
    let mut addendum = Map::new();
    for (namespace, blob) in &record.addendum {
        let decoded = match blob {
            Value::String(encoded) => serde_json::from_str::<Value>(encoded).map_err(|e| e.to_string()),
            Value::Object(_) => Ok(blob.clone()),
            other => Err(format!("unexpected {other} value")),
        };
        match decoded {
            Ok(value) => {
                addendum.insert(namespace.clone(), value);
            }
            Err(e) => warn!(gid = %record.gid, namespace = %namespace, error = %e, "Failed to decode addendum namespace"),
        }
    }
    addendum
}

fn properties(record: &MatchRecord, categories_requested: bool) -> Map<String, Value> {
    let id = record.id();
    let gid = Gid::new(&record.source, &record.layer, &id).to_string();

    let mut props = Map::new();
    props.insert("id".to_string(), Value::String(id.clone()));
    props.insert("gid".to_string(), Value::String(gid.clone()));
    props.insert("layer".to_string(), Value::String(record.layer.clone()));
    props.insert("source".to_string(), Value::String(record.source.clone()));
    props.insert("source_id".to_string(), Value::String(id));
    match record.default_name() {
        Some(name) => {
            props.insert("name".to_string(), Value::String(name));
        }
        None => warn!(gid = %gid, "Record has no default name"),
    }
    props.extend(collect_details(record, categories_requested));

    let addendum = decode_addendum(record);
    if !addendum.is_empty() {
        props.insert("addendum".to_string(), Value::Object(addendum));
    }
    props
}

fn feature(record: &MatchRecord, polygon: bool, categories_requested: bool) -> Option<Feature> {
    let geometry = match (&record.polygon, record.center_point) {
        (Some(polygon_geometry), _) if polygon => polygon_geometry.clone(),
        (_, Some(c)) => json!({"type": "Point", "coordinates": [c.lon, c.lat]}),
        (_, None) => return None,
    };
    Some(Feature {
        kind: "Feature",
        bbox: record_bbox(record).map(|b| b.to_geojson()),
        geometry,
        properties: properties(record, categories_requested),
    })
}

/// Corners of each bounding box, or the centroid when there is none.
fn extent_points(records: &[&MatchRecord]) -> Vec<(f64, f64)> {
    records
        .iter()
        .flat_map(|record| match record_bbox(record) {
            Some(b) => vec![(b.min_lon, b.min_lat), (b.max_lon, b.max_lat)],
            None => record
                .center_point
                .map(|c| vec![(c.lon, c.lat)])
                .unwrap_or_default(),
        })
        .collect()
}

/// `[minLon, minLat, maxLon, maxLat]` over `points`.
pub fn extent(points: &[(f64, f64)]) -> Option<[f64; 4]> {
    if let Some(bad) = points.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
        error!(point = ?bad, "bbox error: non-finite coordinate");
        return None;
    }
    let multi: MultiPoint<f64> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    let Some(rect) = multi.bounding_rect() else {
        debug!("bbox: no points");
        return None;
    };
    Some([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

/// Build the feature collection for `data`.
///
/// Unrecognized `geometries` tokens are reported through `warnings`.
pub fn geojsonify(clean: &Clean, data: &[MatchRecord], warnings: &mut Vec<String>) -> FeatureCollection {
    let geometries: GeometrySet = parse_geometries(clean.geometries.as_deref(), warnings);
    let categories_requested = clean.has_parameter("categories");

    let located = data
        .iter()
        .filter(|record| {
            if record.center_point.is_none() {
                warn!(gid = %record.gid, "No center_point, skipping record");
                return false;
            }
            true
        })
        .collect::<Vec<_>>();

    let (polygons, points): (Vec<&MatchRecord>, Vec<&MatchRecord>) = located
        .iter()
        .copied()
        .filter(|r| if r.has_polygon() { geometries.polygon || geometries.point } else { geometries.point })
        .partition(|r| r.has_polygon() && geometries.polygon);

    let features = polygons
        .iter()
        .filter_map(|r| feature(r, true, categories_requested))
        .chain(points.iter().filter_map(|r| feature(r, false, categories_requested)))
        .collect::<Vec<_>>();

    debug!(
        polygons = polygons.len(),
        points = points.len(),
        geometries = %geometries,
        "Assembled features"
    );

    FeatureCollection {
        kind: "FeatureCollection",
        features,
        bbox: extent(&extent_points(&located)),
    }
}
