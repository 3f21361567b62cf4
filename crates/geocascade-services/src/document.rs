//! Place documents as returned by the search backend and the auxiliary services.
//!
//! A [`MatchRecord`] keeps the handful of fields the query core reasons about as typed
//! fields (identity, geometry, scores) and carries everything else through untouched in
//! [`MatchRecord::details`]. Post-processors flatten parent and address information into
//! `details` before the response is assembled.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::ServiceError, field};

/// Layers that describe a single point rather than an administrative area.
pub const NON_ADMIN_LAYERS: [&str; 3] = ["venue", "address", "street"];

/// Administrative layers ordered from most to least granular.
pub const ADMIN_LAYERS: [&str; 13] = [
    "neighbourhood",
    "borough",
    "locality",
    "localadmin",
    "county",
    "macrocounty",
    "region",
    "macroregion",
    "dependency",
    "country",
    "empire",
    "continent",
    "ocean",
];

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

impl Centroid {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn haversine_km(&self, other: &Self) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// GeoJSON ordering: `[minLon, minLat, maxLon, maxLat]`.
    pub fn to_geojson(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Parse the comma separated `minLon,minLat,maxLon,maxLat` form used by the gazetteer
    /// and point-in-polygon services.
    pub fn from_csv(value: &str) -> Option<Self> {
        let parts = value
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [min_lon, min_lat, max_lon, max_lat] => {
                Some(Self::new(*min_lon, *min_lat, *max_lon, *max_lat))
            }
            _ => None,
        }
    }

    pub fn contains(&self, point: &Centroid) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

/// Bounding boxes are stored JSON-encoded in the index and parsed later in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundingBoxField {
    Parsed(BoundingBox),
    Encoded(String),
}

/// Globally unique `source:layer:id` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gid {
    pub source: String,
    pub layer: String,
    pub id: String,
}

impl Gid {
    pub fn new(source: impl Into<String>, layer: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            layer: layer.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.layer, self.id)
    }
}

impl FromStr for Gid {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(layer), Some(id))
                if !source.is_empty() && !layer.is_empty() && !id.is_empty() =>
            {
                Ok(Self::new(source, layer, id))
            }
            _ => Err(ServiceError::InvalidGid(s.to_string())),
        }
    }
}

/// A single matched place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Composite identifier; old-style documents carry the bare backend `_id` here.
    #[serde(alias = "_id", default)]
    pub gid: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Localized names, keyed by language with `default` as the fallback.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub name: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_point: Option<Centroid>,
    /// GeoJSON geometry, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBoxField>,
    /// Administrative hierarchy, e.g. `country`, `country_id`, `country_a`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parent: Map<String, Value>,
    /// `number`, `street`, `zip`, `unit`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub address_parts: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    /// Source-specific blobs, each JSON-encoded independently.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub addendum: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    /// Everything else, including the flattened place details.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl MatchRecord {
    pub fn new(source: impl Into<String>, layer: impl Into<String>, id: impl Into<String>) -> Self {
        let gid = Gid::new(source, layer, id);
        Self {
            gid: gid.to_string(),
            source_id: Some(gid.id),
            source: gid.source,
            layer: gid.layer,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name
            .insert("default".to_string(), Value::String(name.into()));
        self
    }

    #[must_use]
    pub fn with_centroid(mut self, lat: f64, lon: f64) -> Self {
        self.center_point = Some(Centroid::new(lat, lon));
        self
    }

    #[must_use]
    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(BoundingBoxField::Parsed(bbox));
        self
    }

    #[must_use]
    pub fn with_polygon(mut self, polygon: Value) -> Self {
        self.polygon = Some(polygon);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, layer: &str, name: &str, id: &str) -> Self {
        self.parent
            .insert(layer.to_string(), Value::from(vec![name.to_string()]));
        self.parent
            .insert(format!("{layer}_id"), Value::from(vec![id.to_string()]));
        self
    }

    /// The per-source identifier decoded from the gid, or the raw id for old-style records.
    pub fn id(&self) -> String {
        self.gid
            .parse::<Gid>()
            .map_or_else(|_| self.gid.clone(), |gid| gid.id)
    }

    /// The id as known to the original data source.
    pub fn legacy_id(&self) -> String {
        self.source_id.clone().unwrap_or_else(|| self.id())
    }

    pub fn default_name(&self) -> Option<String> {
        self.name.get("default").and_then(field::string_value)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match &self.bounding_box {
            Some(BoundingBoxField::Parsed(bbox)) => Some(*bbox),
            _ => None,
        }
    }

    pub fn has_polygon(&self) -> bool {
        self.polygon.is_some()
    }

    pub fn is_admin(&self) -> bool {
        !NON_ADMIN_LAYERS.contains(&self.layer.as_str())
    }

    /// Normalized parent value for a placetype, e.g. `parent_value("country")`.
    pub fn parent_value(&self, key: &str) -> Option<String> {
        self.parent.get(key).and_then(field::string_value)
    }

    /// Normalized flattened detail value.
    pub fn detail(&self, key: &str) -> Option<String> {
        self.details.get(key).and_then(field::string_value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_gid_round_trip() {
        let gid: Gid = "openstreetmap:venue:way/123".parse().unwrap();
        assert_eq!(gid.source, "openstreetmap");
        assert_eq!(gid.layer, "venue");
        assert_eq!(gid.id, "way/123");
        assert_eq!(gid.to_string(), "openstreetmap:venue:way/123");
    }

    #[test]
    fn test_gid_rejects_malformed() {
        assert!("osm:venue".parse::<Gid>().is_err());
        assert!("::1".parse::<Gid>().is_err());
    }

    #[test]
    fn test_record_deserializes_backend_document() {
        let record: MatchRecord = serde_json::from_value(json!({
            "_id": "osm:venue:1",
            "source": "osm",
            "layer": "venue",
            "source_id": "99",
            "name": {"default": ["Cafe", "Coffee House"]},
            "center_point": {"lat": 10.0, "lon": 20.0},
            "bounding_box": "{\"min_lat\":9,\"max_lat\":11,\"min_lon\":19,\"max_lon\":21}",
            "population": 0
        }))
        .unwrap();

        assert_eq!(record.gid, "osm:venue:1");
        assert_eq!(record.id(), "1");
        assert_eq!(record.legacy_id(), "99");
        assert_eq!(record.default_name().as_deref(), Some("Cafe"));
        assert!(matches!(
            record.bounding_box,
            Some(BoundingBoxField::Encoded(_))
        ));
        assert_eq!(record.details.get("population"), Some(&json!(0)));
    }

    #[test]
    fn test_old_style_id_is_kept_verbatim() {
        let record = MatchRecord {
            gid: "12345".to_string(),
            ..Default::default()
        };
        assert_eq!(record.id(), "12345");
    }

    #[test]
    fn test_bbox_from_csv() {
        let bbox = BoundingBox::from_csv("-122.5,37.6,-122.3,37.8").unwrap();
        assert_eq!(bbox.to_geojson(), [-122.5, 37.6, -122.3, 37.8]);
        assert!(BoundingBox::from_csv("1,2,3").is_none());
        assert!(BoundingBox::from_csv("a,b,c,d").is_none());
    }

    #[test]
    fn test_haversine() {
        let a = Centroid::new(0.0, 0.0);
        let b = Centroid::new(0.0, 1.0);
        let d = a.haversine_km(&b);
        assert!((d - 111.19).abs() < 0.1, "one degree at equator, got {d}");
        assert!(a.haversine_km(&a).abs() < f64::EPSILON);
    }
}
