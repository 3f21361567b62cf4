use ahash::AHashSet;
use geocascade_services::{ADMIN_LAYERS, MatchRecord};
use itertools::Itertools;
use tracing::debug;

use crate::context::RequestContext;

/// Records describing the same place share this key even when their gids differ.
/// Unnamed records only match themselves.
fn identity_key(record: &MatchRecord) -> String {
    let name = record.default_name().unwrap_or_default().trim().to_lowercase();
    if name.is_empty() {
        return record.gid.clone();
    }
    let parents = ADMIN_LAYERS
        .iter()
        .filter_map(|layer| record.parent_value(&format!("{layer}_id")))
        .join("|");
    let number = record
        .address_parts
        .get("number")
        .and_then(geocascade_services::field::string_value)
        .unwrap_or_default();
    format!("{}|{name}|{number}|{parents}", record.layer)
}

/// Drop repeated places, keeping the first (best ranked) one, then cap at `size`.
pub fn dedupe(ctx: &mut RequestContext) {
    let before = ctx.data.len();
    let mut gids = AHashSet::with_capacity(before);
    let mut keys = AHashSet::with_capacity(before);
    ctx.data
        .retain(|r| gids.insert(r.gid.clone()) && keys.insert(identity_key(r)));
    ctx.data.truncate(ctx.clean.size);
    debug!(before, after = ctx.data.len(), "Deduplicated results");
}
