//! Stage effects that consult external services.
//!
//! Every controller owns `Arc` handles to the services it needs and implements
//! [`StageEffect`](crate::pipeline::StageEffect). Expected service failures are pushed onto
//! `ctx.errors` by the controller itself so the rest of the pipeline can carry on.

mod coarse_reverse;
mod libpostal;
mod place;
mod placeholder;
mod placeholder_geometries;
mod search;
mod search_with_ids;

pub use coarse_reverse::CoarseReverse;
pub use libpostal::{Libpostal, StructuredLibpostal};
pub use place::Place;
pub use placeholder::Placeholder;
pub use placeholder_geometries::PlaceholderGeometries;
pub use search::Search;
pub use search_with_ids::SearchWithIds;

use geocascade_services::{MatchRecord, MgetKey};
use serde_json::{Map, Value};

/// Multi-get keys for `records`: every legacy key first, then every current key.
pub fn geometry_join_keys(index: &str, records: &[MatchRecord]) -> Vec<MgetKey> {
    let legacy = records
        .iter()
        .map(|r| MgetKey::legacy(index, &r.layer, &r.legacy_id()));
    let modern = records.iter().map(|r| MgetKey::modern(index, &r.gid));
    legacy.chain(modern).collect()
}

/// Record one administrative ancestor in the `parent` map, keeping values unique.
pub(crate) fn push_parent(
    parent: &mut Map<String, Value>,
    layer: &str,
    name: &str,
    id: &str,
    abbr: Option<&str>,
) {
    let mut push = |key: String, value: &str| {
        let entry = parent
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            if !values.iter().any(|v| v.as_str() == Some(value)) {
                values.push(Value::String(value.to_string()));
            }
        }
    };
    push(layer.to_string(), name);
    push(format!("{layer}_id"), id);
    if let Some(abbr) = abbr {
        push(format!("{layer}_a"), abbr);
    }
}
