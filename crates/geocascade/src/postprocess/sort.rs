use std::cmp::Ordering;

use geocascade_services::MatchRecord;
use serde_json::Value;

use crate::context::RequestContext;

fn population(record: &MatchRecord) -> f64 {
    record
        .details
        .get("population")
        .and_then(Value::as_f64)
        .or(record.popularity)
        .unwrap_or(0.0)
}

/// Descending, with missing values last.
fn desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ascending, with missing values last.
fn asc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Confidence descending, then population descending, then distance ascending. Stable.
pub fn sort_response_data(ctx: &mut RequestContext) {
    ctx.data.sort_by(|a, b| {
        desc(a.confidence, b.confidence)
            .then_with(|| population(b).total_cmp(&population(a)))
            .then_with(|| asc(a.distance, b.distance))
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::Clean;

    fn record(id: &str, confidence: Option<f64>, population: u64) -> MatchRecord {
        let mut r = MatchRecord::new("whosonfirst", "locality", id);
        r.confidence = confidence;
        r.details.insert("population".to_string(), json!(population));
        r
    }

    #[test]
    fn test_sort_order() {
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.data = vec![
            record("1", Some(0.5), 10),
            record("2", None, 1_000_000),
            record("3", Some(0.9), 10),
            record("4", Some(0.5), 5_000),
        ];

        sort_response_data(&mut ctx);

        let ids = ctx.data.iter().map(MatchRecord::id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["3", "4", "1", "2"]);
    }
}
