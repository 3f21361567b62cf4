//! Per-request state threaded through a pipeline.

use std::collections::BTreeMap;

use geocascade_services::{BoundingBox, Centroid, Gid, MatchRecord};
use serde::Serialize;
use serde_json::Value;

/// Which analyzer produced `parsed_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextParser {
    Libpostal,
    Addressit,
}

/// Address components keyed by field name (`number`, `street`, `city`, `query`, ...).
///
/// Empty values are never stored, so presence and non-emptiness coincide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParsedText(BTreeMap<String, String>);

impl ParsedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Insert a trimmed value; blank values remove the field instead.
    pub fn insert(&mut self, field: impl Into<String>, value: impl AsRef<str>) {
        let field = field.into();
        let value = value.as_ref().trim();
        if value.is_empty() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, value.to_string());
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for ParsedText {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut parsed = Self::new();
        for (k, v) in iter {
            parsed.insert(k, v);
        }
        parsed
    }
}

/// Sanitized request parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Clean {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_text: Option<ParsedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<TextParser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Present (possibly empty) when the caller asked for categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Raw comma separated geometry selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometries: Option<String>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(rename = "focus.point", skip_serializing_if = "Option::is_none")]
    pub focus_point: Option<Centroid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<Centroid>,
    #[serde(rename = "boundary.country", skip_serializing_if = "Option::is_none")]
    pub boundary_country: Option<String>,
    #[serde(rename = "boundary.rect", skip_serializing_if = "Option::is_none")]
    pub boundary_rect: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_gids")]
    pub ids: Vec<Gid>,
}

fn serialize_gids<S: serde::Serializer>(ids: &[Gid], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(ids.iter().map(ToString::to_string))
}

impl Clean {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_parsed_text(mut self, parsed: ParsedText) -> Self {
        self.parsed_text = Some(parsed);
        self
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = Some(layers.iter().map(ToString::to_string).collect());
        self
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = Some(sources.iter().map(ToString::to_string).collect());
        self
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = Some(categories.iter().map(ToString::to_string).collect());
        self
    }

    pub fn with_geometries(mut self, geometries: impl Into<String>) -> Self {
        self.geometries = Some(geometries.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn with_point(mut self, lat: f64, lon: f64) -> Self {
        self.point = Some(Centroid::new(lat, lon));
        self
    }

    pub fn with_focus_point(mut self, lat: f64, lon: f64) -> Self {
        self.focus_point = Some(Centroid::new(lat, lon));
        self
    }

    pub fn with_ids(mut self, ids: Vec<Gid>) -> Self {
        self.ids = ids;
        self
    }

    /// Whether a request parameter was supplied, by its public name.
    pub fn has_parameter(&self, name: &str) -> bool {
        match name {
            "text" => self.text.is_some(),
            "parsed_text" => self.parsed_text.is_some(),
            "layers" => self.layers.is_some(),
            "sources" => self.sources.is_some(),
            "categories" => self.categories.is_some(),
            "geometries" => self.geometries.is_some(),
            "lang" => self.lang.is_some(),
            "focus.point" => self.focus_point.is_some(),
            "point" => self.point.is_some(),
            "boundary.country" => self.boundary_country.is_some(),
            "boundary.rect" => self.boundary_rect.is_some(),
            "ids" => !self.ids.is_empty(),
            _ => false,
        }
    }

    pub fn parsed(&self, field: &str) -> Option<&str> {
        self.parsed_text.as_ref().and_then(|p| p.get(field))
    }
}

/// Free-form response metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Meta(BTreeMap<String, Value>);

impl Meta {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn query_type(&self) -> Option<&str> {
        self.0.get("query_type").and_then(Value::as_str)
    }

    pub fn set_query_type(&mut self, query_type: &str) {
        self.insert("query_type", query_type);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mutable state owned by exactly one pipeline execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub clean: Clean,
    /// Append-only.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub data: Vec<MatchRecord>,
    pub meta: Meta,
}

impl RequestContext {
    pub fn new(clean: Clean) -> Self {
        Self {
            clean,
            ..Default::default()
        }
    }

    /// Context carrying the outcome of request sanitization.
    pub fn sanitized(clean: Clean, errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            clean,
            errors,
            warnings,
            ..Default::default()
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}
