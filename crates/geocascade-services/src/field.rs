//! Normalization of loosely typed document values.
//!
//! Backend documents carry the same logical field as a scalar, as the first element of an
//! array, or not at all. Three field kinds are distinguished and each has its own notion of
//! "empty":
//!
//! - **string kind**: empty strings, arrays, objects, booleans, nulls and numbers are all
//!   treated as absent. Arrays contribute their first element.
//! - **default kind**: numbers are always kept (zero included), strings and containers are
//!   kept when non-empty, booleans and nulls are dropped.
//! - **array kind**: non-empty arrays pass through, non-empty scalars are wrapped in a
//!   single-element list, zero-length values are dropped.

use serde_json::Value;

/// Normalize a string-kind value to a non-empty string.
pub fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.first().and_then(string_value),
        Value::Object(map) if !map.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

/// Normalize a default-kind value, keeping numbers verbatim.
pub fn default_value(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) if !s.is_empty() => Some(value.clone()),
        Value::Array(items) if !items.is_empty() => Some(value.clone()),
        Value::Object(map) if !map.is_empty() => Some(value.clone()),
        _ => None,
    }
}

/// Normalize an array-kind value.
pub fn array_value(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() => Some(items.clone()),
        Value::Array(_) => None,
        other => default_value(other).map(|v| vec![v]),
    }
}

/// First element of an array, or the value itself for scalars.
pub fn first_value(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_string_kind_blanks_empty_like_values() {
        for empty in [
            json!([]),
            json!({}),
            json!(""),
            json!(17),
            json!(0),
            json!(true),
            json!(null),
        ] {
            assert_eq!(string_value(&empty), None, "{empty} should be blank");
        }
    }

    #[test]
    fn test_string_kind_takes_first_of_array() {
        let value = json!(["first value", "second value"]);
        assert_eq!(string_value(&value).as_deref(), Some("first value"));
    }

    #[test]
    fn test_string_kind_stringifies_objects() {
        let value = json!({"street": "Main St"});
        assert_eq!(
            string_value(&value).as_deref(),
            Some(r#"{"street":"Main St"}"#)
        );
    }

    #[test]
    fn test_default_kind_keeps_zero() {
        assert_eq!(default_value(&json!(0)), Some(json!(0)));
        assert_eq!(default_value(&json!(17.3)), Some(json!(17.3)));
        assert_eq!(default_value(&json!("text")), Some(json!("text")));
    }

    #[test]
    fn test_default_kind_drops_empty_values() {
        for empty in [json!(null), json!(true), json!({}), json!([]), json!("")] {
            assert_eq!(default_value(&empty), None, "{empty} should be dropped");
        }
    }

    #[test]
    fn test_array_kind() {
        assert_eq!(array_value(&json!([])), None);
        assert_eq!(array_value(&json!([1, 2])), Some(vec![json!(1), json!(2)]));
        assert_eq!(array_value(&json!("food")), Some(vec![json!("food")]));
        assert_eq!(
            array_value(&json!({"a": 1})),
            Some(vec![json!({"a": 1})])
        );
        assert_eq!(array_value(&json!("")), None);
    }
}
