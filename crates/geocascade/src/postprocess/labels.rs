use geocascade_services::MatchRecord;

use crate::context::RequestContext;

const LOCAL_FIELDS: [&str; 4] = ["locality", "localadmin", "borough", "county"];

/// Countries where the region and country are better known by abbreviation.
const ABBREVIATING_COUNTRIES: [&str; 2] = ["USA", "CAN"];

fn first_detail(record: &MatchRecord, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| record.detail(field))
}

fn label(record: &MatchRecord) -> Option<String> {
    let name = record.default_name();
    let abbreviate = record
        .detail("country_a")
        .is_some_and(|code| ABBREVIATING_COUNTRIES.contains(&code.as_str()));

    let regional = if abbreviate {
        first_detail(record, &["region_a", "region", "macroregion"])
    } else {
        first_detail(record, &["region", "macroregion"])
    };
    let country = if abbreviate {
        first_detail(record, &["country_a", "country"])
    } else {
        first_detail(record, &["country", "dependency"])
    };

    let mut parts: Vec<String> = Vec::new();
    for part in [name, first_detail(record, &LOCAL_FIELDS), regional, country]
        .into_iter()
        .flatten()
    {
        if !parts.iter().any(|p| p.eq_ignore_ascii_case(&part)) {
            parts.push(part);
        }
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Human readable label from the name and the flattened admin hierarchy.
pub fn assign_labels(ctx: &mut RequestContext) {
    for record in &mut ctx.data {
        record.label = label(record);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::Clean;

    fn record(name: &str, details: &[(&str, &str)]) -> MatchRecord {
        let mut r = MatchRecord::new("whosonfirst", "venue", "1").with_name(name);
        for (k, v) in details {
            r.details.insert((*k).to_string(), json!([v]));
        }
        r
    }

    #[test]
    fn test_us_label_abbreviates() {
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.data = vec![record(
            "Empire State Building",
            &[
                ("locality", "New York"),
                ("region", "New York"),
                ("region_a", "NY"),
                ("country", "United States"),
                ("country_a", "USA"),
            ],
        )];

        assign_labels(&mut ctx);

        assert_eq!(
            ctx.data[0].label.as_deref(),
            Some("Empire State Building, New York, NY, USA")
        );
    }

    #[test]
    fn test_duplicate_parts_collapse() {
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.data = vec![record(
            "Berlin",
            &[
                ("locality", "Berlin"),
                ("region", "Berlin"),
                ("country", "Germany"),
                ("country_a", "DEU"),
            ],
        )];

        assign_labels(&mut ctx);

        assert_eq!(ctx.data[0].label.as_deref(), Some("Berlin, Germany"));
    }
}
