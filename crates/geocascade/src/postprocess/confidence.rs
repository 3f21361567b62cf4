//! Confidence scores in `[0, 1]`.
//!
//! Three policies, each applied to a different kind of result: text similarity for
//! ordinary search hits, layer agreement for gazetteer and fallback hits, and distance
//! bands for reverse hits.

use ahash::AHashSet;
use geocascade_services::MatchRecord;
use itertools::Itertools;
use tracing::debug;

use crate::context::{Clean, RequestContext};

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn tokens(text: &str) -> AHashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// The text the caller searched for: free text, else the structured parts joined.
fn query_text(clean: &Clean) -> Option<String> {
    if let Some(text) = &clean.text {
        return Some(text.clone());
    }
    let parsed = clean.parsed_text.as_ref()?;
    let joined = parsed.iter().map(|(_, value)| value).join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn text_similarity(query: &str, name: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let name = name.trim().to_lowercase();
    if query.is_empty() || name.is_empty() {
        return 0.0;
    }
    if query == name {
        return 1.0;
    }
    if query.starts_with(&name) || name.starts_with(&query) {
        return 0.9;
    }
    let q = tokens(&query);
    let n = tokens(&name);
    let union = q.union(&n).count();
    if union == 0 {
        return 0.0;
    }
    let jaccard = q.intersection(&n).count() as f64 / union as f64;
    0.3 + 0.6 * jaccard
}

fn is_fallback(record: &MatchRecord) -> bool {
    record.match_type.as_deref() == Some("fallback")
}

/// Text similarity between the query and each hit's name, for non-fallback hits.
pub fn confidence_score(ctx: &mut RequestContext) {
    let Some(query) = query_text(&ctx.clean) else {
        return;
    };
    for record in ctx.data.iter_mut().filter(|r| !is_fallback(r)) {
        let name = record.default_name().unwrap_or_default();
        record.confidence = Some(round3(text_similarity(&query, &name)));
    }
    debug!(query = %query, results = ctx.data.len(), "Scored by text similarity");
}

/// The layer a complete match for the parsed text would be at.
fn expected_layer(clean: &Clean) -> Option<&'static str> {
    let parsed = clean.parsed_text.as_ref()?;
    let layer = if parsed.has("number") && parsed.has("street") {
        "address"
    } else if parsed.has("street") {
        "street"
    } else if parsed.has("query") {
        "venue"
    } else if parsed.has("postalcode") {
        "postalcode"
    } else {
        [
            ("neighbourhood", "neighbourhood"),
            ("borough", "borough"),
            ("city", "locality"),
            ("county", "county"),
            ("state", "region"),
            ("country", "country"),
        ]
        .into_iter()
        .find(|(field, _)| parsed.has(field))
        .map(|(_, layer)| layer)?
    };
    Some(layer)
}

fn fallback_score(layer: &str) -> f64 {
    match layer {
        "venue" | "address" => 0.8,
        "street" | "postalcode" => 0.75,
        "neighbourhood" | "borough" | "locality" | "localadmin" => 0.6,
        "county" | "macrocounty" => 0.4,
        "region" | "macroregion" => 0.3,
        _ => 0.1,
    }
}

/// Score fallback hits by whether they landed at the layer the parse asked for.
pub fn confidence_score_fallback(ctx: &mut RequestContext) {
    let expected = expected_layer(&ctx.clean);
    for record in ctx.data.iter_mut().filter(|r| is_fallback(r)) {
        let score = if expected == Some(record.layer.as_str()) {
            1.0
        } else {
            fallback_score(&record.layer)
        };
        record.confidence = Some(score);
    }
}

fn distance_band(distance_km: f64) -> f64 {
    match distance_km {
        d if d < 0.001 => 1.0,
        d if d < 0.01 => 0.9,
        d if d < 0.1 => 0.8,
        d if d < 0.25 => 0.7,
        d if d < 1.0 => 0.6,
        _ => 0.5,
    }
}

/// Reverse hits are scored by how close they are to the queried point.
pub fn confidence_score_reverse(ctx: &mut RequestContext) {
    for record in &mut ctx.data {
        if let Some(distance) = record.distance {
            record.confidence = Some(distance_band(distance));
        }
    }
}
