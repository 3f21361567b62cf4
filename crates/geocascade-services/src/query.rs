//! Backend-agnostic description of a search request.
//!
//! The query core decides *which* kind of query to run; turning a [`SearchQuery`] into the
//! backend's own query language is the search client's job.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::document::{BoundingBox, Centroid, MatchRecord};

/// The query strategies the backend knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Cascading fallback over the parsed address parts.
    Fallback,
    /// Legacy full-text query used with the fallback text analyzer.
    Original,
    Structured,
    Reverse,
    Autocomplete,
    /// Street/number query constrained by admin ids resolved by the gazetteer.
    AddressUsingIds,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Original => "original",
            Self::Structured => "structured",
            Self::Reverse => "reverse",
            Self::Autocomplete => "autocomplete",
            Self::AddressUsingIds => "address_using_ids",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub kind: QueryKind,
    pub text: Option<String>,
    pub parsed_text: BTreeMap<String, String>,
    pub layers: Option<Vec<String>>,
    pub sources: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub size: usize,
    pub focus_point: Option<Centroid>,
    /// Reverse/nearby origin.
    pub point: Option<Centroid>,
    pub boundary_country: Option<String>,
    pub boundary_rect: Option<BoundingBox>,
    /// Admin ids per layer, used by [`QueryKind::AddressUsingIds`].
    pub admin_ids: BTreeMap<String, Vec<String>>,
}

impl SearchQuery {
    pub fn new(kind: QueryKind, size: usize) -> Self {
        Self {
            kind,
            text: None,
            parsed_text: BTreeMap::new(),
            layers: None,
            sources: None,
            categories: None,
            size,
            focus_point: None,
            point: None,
            boundary_country: None,
            boundary_rect: None,
            admin_ids: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub records: Vec<MatchRecord>,
    pub meta: SearchMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchMeta {
    pub took_ms: Option<u64>,
    pub total: Option<u64>,
}

/// One entry of a batched multi-get.
///
/// New-style documents are keyed by gid alone. Old-style documents are keyed by source id
/// with the layer used as the document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MgetKey {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id")]
    pub id: String,
}

impl MgetKey {
    pub fn modern(index: &str, gid: &str) -> Self {
        Self {
            index: index.to_string(),
            doc_type: None,
            id: gid.to_string(),
        }
    }

    pub fn legacy(index: &str, layer: &str, source_id: &str) -> Self {
        Self {
            index: index.to_string(),
            doc_type: Some(layer.to_string()),
            id: source_id.to_string(),
        }
    }
}
