//! Which record fields become feature properties, and how each is normalized.

use geocascade_services::{MatchRecord, field};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Default,
}

/// Flattened detail fields, in output order.
const DETAIL_FIELDS: [(&str, Kind); 40] = [
    ("housenumber", Kind::String),
    ("street", Kind::String),
    ("postalcode", Kind::String),
    ("postalcode_gid", Kind::String),
    ("country", Kind::String),
    ("country_gid", Kind::String),
    ("country_a", Kind::String),
    ("dependency", Kind::String),
    ("dependency_gid", Kind::String),
    ("dependency_a", Kind::String),
    ("macroregion", Kind::String),
    ("macroregion_gid", Kind::String),
    ("macroregion_a", Kind::String),
    ("region", Kind::String),
    ("region_gid", Kind::String),
    ("region_a", Kind::String),
    ("macrocounty", Kind::String),
    ("macrocounty_gid", Kind::String),
    ("macrocounty_a", Kind::String),
    ("county", Kind::String),
    ("county_gid", Kind::String),
    ("county_a", Kind::String),
    ("localadmin", Kind::String),
    ("localadmin_gid", Kind::String),
    ("localadmin_a", Kind::String),
    ("locality", Kind::String),
    ("locality_gid", Kind::String),
    ("locality_a", Kind::String),
    ("borough", Kind::String),
    ("borough_gid", Kind::String),
    ("borough_a", Kind::String),
    ("neighbourhood", Kind::String),
    ("neighbourhood_gid", Kind::String),
    ("continent", Kind::String),
    ("continent_gid", Kind::String),
    ("ocean", Kind::String),
    ("ocean_gid", Kind::String),
    ("marinearea", Kind::String),
    ("marinearea_gid", Kind::String),
    ("population", Kind::Default),
];

fn normalize(kind: Kind, value: &Value) -> Option<Value> {
    match kind {
        Kind::String => field::string_value(value).map(Value::String),
        Kind::Default => field::default_value(value),
    }
}

fn insert_string(props: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        props.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn insert_number(props: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    if let Some(number) = value.and_then(serde_json::Number::from_f64) {
        props.insert(key.to_string(), Value::Number(number));
    }
}

/// Feature properties drawn from the record's scores, labels and flattened details.
///
/// `category` is only emitted when the caller asked for categories.
pub fn collect_details(record: &MatchRecord, categories_requested: bool) -> Map<String, Value> {
    let mut props = Map::new();

    for (key, kind) in DETAIL_FIELDS {
        if let Some(value) = record.details.get(key).and_then(|v| normalize(kind, v)) {
            props.insert(key.to_string(), value);
        }
    }
    insert_number(&mut props, "confidence", record.confidence);
    insert_number(&mut props, "distance", record.distance);
    insert_string(&mut props, "match_type", record.match_type.as_deref());
    insert_string(&mut props, "accuracy", record.accuracy.as_deref());
    insert_string(&mut props, "label", record.label.as_deref());

    if categories_requested {
        if let Some(categories) = record.category.as_ref().and_then(field::array_value) {
            props.insert("category".to_string(), Value::Array(categories));
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_string_kind_blanks_empty_like_values() {
        let mut record = MatchRecord::new("osm", "venue", "1");
        record.details.insert("street".to_string(), json!(""));
        record.details.insert("locality".to_string(), json!(["Paris", "Lutetia"]));
        record.details.insert("region".to_string(), json!(true));
        record.details.insert("county".to_string(), json!(12));
        record.details.insert("population".to_string(), json!(0));

        let props = collect_details(&record, false);

        assert!(props.get("street").is_none());
        assert_eq!(props["locality"], json!("Paris"));
        assert!(props.get("region").is_none());
        assert!(props.get("county").is_none());
        assert_eq!(props["population"], json!(0), "default kind keeps zero");
    }

    #[test]
    fn test_scores_pass_through() {
        let mut record = MatchRecord::new("osm", "venue", "1");
        record.confidence = Some(0.0);
        record.distance = Some(1.25);
        let props = collect_details(&record, false);
        assert_eq!(props["confidence"], json!(0.0));
        assert_eq!(props["distance"], json!(1.25));
    }

    #[test]
    fn test_category_only_when_requested() {
        let mut record = MatchRecord::new("osm", "venue", "1");
        record.category = Some(json!("food"));
        assert!(collect_details(&record, false).get("category").is_none());
        assert_eq!(collect_details(&record, true)["category"], json!(["food"]));

        record.category = Some(json!([]));
        assert!(collect_details(&record, true).get("category").is_none());
    }
}
