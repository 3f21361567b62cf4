use geocascade_services::{MatchRecord, field};
use serde_json::Value;
use tracing::debug;

use crate::context::RequestContext;

fn address_part(record: &MatchRecord, key: &str) -> Option<String> {
    record.address_parts.get(key).and_then(field::string_value)
}

/// Rewrites address names as `<street> <number>` in countries that write them that way.
pub fn local_naming_conventions(
    countries: Vec<String>,
) -> impl Fn(&mut RequestContext) + Send + Sync + 'static {
    move |ctx: &mut RequestContext| {
        for record in ctx.data.iter_mut().filter(|r| r.layer == "address") {
            let in_country = record
                .parent_value("country_a")
                .is_some_and(|code| countries.iter().any(|c| c.eq_ignore_ascii_case(&code)));
            if !in_country {
                continue;
            }
            let (Some(number), Some(street)) =
                (address_part(record, "number"), address_part(record, "street"))
            else {
                continue;
            };
            let name = format!("{street} {number}");
            debug!(gid = %record.gid, name = %name, "Applied local naming convention");
            record.name.insert("default".to_string(), Value::String(name));
        }
    }
}
