//! Contracts for the external services the query core consults.
//!
//! Every service sits behind an object-safe async trait so the pipeline can hold
//! `Arc<dyn ...>` handles and tests can swap in the in-memory implementations from
//! [`crate::memory`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    document::{Centroid, MatchRecord},
    error::Result,
    query::{MgetKey, SearchQuery, SearchResponse},
};

/// The full-text/geo search index.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse>;

    /// Fetch documents by key. Keys that match nothing are silently absent from the result.
    async fn mget(&self, keys: &[MgetKey]) -> Result<Vec<MatchRecord>>;
}

/// One labelled span returned by the address parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedComponent {
    pub label: String,
    pub value: String,
}

impl ParsedComponent {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Free-text address parser.
#[async_trait]
pub trait AddressParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<Vec<ParsedComponent>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub abbr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerGeometry {
    /// `minLon,minLat,maxLon,maxLat`
    #[serde(default)]
    pub bbox: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// A candidate administrative area from the gazetteer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerPlace {
    pub id: u64,
    pub name: String,
    pub placetype: String,
    #[serde(default)]
    pub population: Option<u64>,
    /// One map per known hierarchy, placetype to ancestor.
    #[serde(default)]
    pub lineage: Vec<BTreeMap<String, LineageEntry>>,
    #[serde(default)]
    pub geom: Option<GazetteerGeometry>,
}

/// Administrative-area text lookup.
#[async_trait]
pub trait Gazetteer: Send + Sync {
    async fn search(&self, text: &str, lang: Option<&str>) -> Result<Vec<GazetteerPlace>>;
}

/// An area containing the queried point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipArea {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub abbr: Option<String>,
    #[serde(default)]
    pub centroid: Option<Centroid>,
    /// `minLon,minLat,maxLon,maxLat`
    #[serde(default)]
    pub bounding_box: Option<String>,
}

/// Point-in-polygon lookup, keyed by layer.
#[async_trait]
pub trait PointInPolygon: Send + Sync {
    async fn lookup(
        &self,
        point: Centroid,
        layers: Option<&[String]>,
    ) -> Result<BTreeMap<String, Vec<PipArea>>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedPoint {
    pub number: String,
    pub source: String,
    pub source_id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Address-point interpolation along a street.
#[async_trait]
pub trait Interpolator: Send + Sync {
    async fn interpolate(
        &self,
        street: &str,
        number: &str,
        near: Centroid,
    ) -> Result<Option<InterpolatedPoint>>;
}

/// Localized names for administrative ids.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Returns the translated name for each id the service knows about.
    async fn translate(&self, ids: &[String], lang: &str) -> Result<BTreeMap<String, String>>;
}
