//! Shared vocabulary for the geocascade query core.
//!
//! This crate owns the place document model, the backend-agnostic search request, the
//! async traits for every external service the core consults, and two sets of
//! implementations: reqwest clients (behind the default `http` feature) and in-memory
//! fakes in [`memory`].

pub mod document;
pub mod endpoint;
pub mod error;
pub mod field;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod query;
pub mod service;

pub use document::{
    ADMIN_LAYERS, BoundingBox, BoundingBoxField, Centroid, Gid, MatchRecord, NON_ADMIN_LAYERS,
};
pub use endpoint::ServiceEndpoint;
pub use error::{Result, ServiceError};
pub use query::{MgetKey, QueryKind, SearchMeta, SearchQuery, SearchResponse};
pub use service::{
    AddressParser, Gazetteer, GazetteerGeometry, GazetteerPlace, InterpolatedPoint, Interpolator,
    LanguageService, LineageEntry, ParsedComponent, PipArea, PointInPolygon, SearchBackend,
};
