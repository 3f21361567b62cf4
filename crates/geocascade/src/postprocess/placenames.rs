use geocascade_services::{ADMIN_LAYERS, MatchRecord};
use serde_json::Value;

use crate::context::RequestContext;

const ADDRESS_PART_NAMES: [(&str, &str); 4] = [
    ("number", "housenumber"),
    ("street", "street"),
    ("zip", "postalcode"),
    ("unit", "unit"),
];

fn rename(record: &mut MatchRecord) {
    for (from, to) in ADDRESS_PART_NAMES {
        if let Some(value) = record.address_parts.remove(from) {
            record.details.entry(to).or_insert(value);
        }
    }
    for (key, value) in std::mem::take(&mut record.parent) {
        record.details.insert(key, value);
    }
}

/// Flatten parent hierarchy and address parts into the record's details.
pub fn rename_placenames(ctx: &mut RequestContext) {
    ctx.data.iter_mut().for_each(rename);
}

fn to_gid(layer: &str, id: &Value) -> Value {
    let id = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if id.contains(':') {
        Value::String(id)
    } else {
        Value::String(format!("whosonfirst:{layer}:{id}"))
    }
}

/// Replace `<layer>_id` details with `<layer>_gid` holding full gids.
pub fn normalize_parent_ids(ctx: &mut RequestContext) {
    let layers = ADMIN_LAYERS.iter().copied().chain(["postalcode"]);
    let layers = layers.collect::<Vec<_>>();
    for record in &mut ctx.data {
        for layer in &layers {
            let Some(ids) = record.details.remove(&format!("{layer}_id")) else {
                continue;
            };
            let gids = match &ids {
                Value::Array(ids) => Value::Array(ids.iter().map(|id| to_gid(layer, id)).collect()),
                Value::Null => continue,
                id => Value::Array(vec![to_gid(layer, id)]),
            };
            record.details.insert(format!("{layer}_gid"), gids);
        }
    }
}
