//! Boolean guards over request state.
//!
//! Guards are a small expression tree rather than closures so they can be cloned into
//! several stages, reused as building blocks for derived guards, and rendered in logs.
//! Evaluation is pure: a [`Predicate`] only ever reads the [`RequestContext`].
//!
//! ```rust
//! use geocascade::context::{Clean, RequestContext};
//! use geocascade::predicates::{all, has_request_errors, has_response_data, not};
//!
//! let guard = all([not(has_request_errors()), not(has_response_data())]);
//! assert!(guard.eval(&RequestContext::new(Clean::new(10))));
//! ```

use std::fmt;

use geocascade_services::NON_ADMIN_LAYERS;
use itertools::Itertools;

use crate::context::{RequestContext, TextParser};

/// Parsed-text fields that name an administrative area.
pub const ADMIN_PARSED_FIELDS: [&str; 6] = [
    "neighbourhood",
    "borough",
    "city",
    "county",
    "state",
    "country",
];

/// Parsed-text fields that make an analysis more specific than an admin area.
const NON_ADMIN_PARSED_FIELDS: [&str; 5] = ["number", "street", "query", "category", "postalcode"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    HasResponseData,
    HasRequestErrors,
    HasParsedTextPropertiesAny(Vec<String>),
    HasParsedTextPropertiesAll(Vec<String>),
    HasResultsAtLayers(Vec<String>),
    HasRequestParameter(String),
    /// Every result is an administrative area.
    HasAdminOnlyResults,
    IsOnlyNonAdminLayers,
    /// Parse holds admin fields only. An empty parse is not admin-only, so it still
    /// reaches the fallback query instead of the gazetteer.
    IsAdminOnlyAnalysis,
    IsRequestSourcesOnlyOneProvider(String),
    IsPolygonRequest,
    /// Reverse request restricted to administrative layers.
    IsCoarseReverse,
    IsAddressItParse,
    SourcesUndefined,
    SourcesInclude(String),
    LayersUndefined,
    LayersIncludeAny(Vec<String>),
}

impl Leaf {
    fn eval(&self, ctx: &RequestContext) -> bool {
        let clean = &ctx.clean;
        match self {
            Self::HasResponseData => ctx.has_data(),
            Self::HasRequestErrors => ctx.has_errors(),
            Self::HasParsedTextPropertiesAny(fields) => clean
                .parsed_text
                .as_ref()
                .is_some_and(|p| fields.iter().any(|f| p.has(f))),
            Self::HasParsedTextPropertiesAll(fields) => clean
                .parsed_text
                .as_ref()
                .is_some_and(|p| fields.iter().all(|f| p.has(f))),
            Self::HasResultsAtLayers(layers) => {
                ctx.data.iter().any(|record| layers.contains(&record.layer))
            }
            Self::HasRequestParameter(name) => clean.has_parameter(name),
            Self::HasAdminOnlyResults => ctx.has_data() && ctx.data.iter().all(|r| r.is_admin()),
            Self::IsOnlyNonAdminLayers => clean.layers.as_ref().is_some_and(|layers| {
                !layers.is_empty() && layers.iter().all(|l| NON_ADMIN_LAYERS.contains(&l.as_str()))
            }),
            Self::IsAdminOnlyAnalysis => clean.parsed_text.as_ref().is_some_and(|p| {
                !p.is_empty() && !NON_ADMIN_PARSED_FIELDS.iter().any(|f| p.has(f))
            }),
            Self::IsRequestSourcesOnlyOneProvider(source) => clean
                .sources
                .as_ref()
                .is_some_and(|sources| sources.len() == 1 && sources[0] == *source),
            Self::IsPolygonRequest => clean
                .geometries
                .as_ref()
                .is_some_and(|g| g.split(',').any(|token| token.trim() == "polygon")),
            Self::IsCoarseReverse => clean.layers.as_ref().is_some_and(|layers| {
                !layers.iter().any(|l| NON_ADMIN_LAYERS.contains(&l.as_str()))
            }),
            Self::IsAddressItParse => clean.parser == Some(TextParser::Addressit),
            Self::SourcesUndefined => clean.sources.is_none(),
            Self::SourcesInclude(source) => clean
                .sources
                .as_ref()
                .is_some_and(|sources| sources.contains(source)),
            Self::LayersUndefined => clean.layers.is_none(),
            Self::LayersIncludeAny(wanted) => clean
                .layers
                .as_ref()
                .is_some_and(|layers| layers.iter().any(|l| wanted.contains(l))),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasResponseData => f.write_str("hasResponseData"),
            Self::HasRequestErrors => f.write_str("hasRequestErrors"),
            Self::HasParsedTextPropertiesAny(fields) => {
                write!(f, "hasParsedTextProperties.any({})", fields.iter().join(","))
            }
            Self::HasParsedTextPropertiesAll(fields) => {
                write!(f, "hasParsedTextProperties.all({})", fields.iter().join(","))
            }
            Self::HasResultsAtLayers(layers) => {
                write!(f, "hasResultsAtLayers({})", layers.iter().join(","))
            }
            Self::HasRequestParameter(name) => write!(f, "hasRequestParameter({name})"),
            Self::HasAdminOnlyResults => f.write_str("hasAdminOnlyResults"),
            Self::IsOnlyNonAdminLayers => f.write_str("isOnlyNonAdminLayers"),
            Self::IsAdminOnlyAnalysis => f.write_str("isAdminOnlyAnalysis"),
            Self::IsRequestSourcesOnlyOneProvider(source) => {
                write!(f, "isRequestSourcesOnly({source})")
            }
            Self::IsPolygonRequest => f.write_str("isPolygonRequest"),
            Self::IsCoarseReverse => f.write_str("isCoarseReverse"),
            Self::IsAddressItParse => f.write_str("isAddressItParse"),
            Self::SourcesUndefined => f.write_str("sourcesUndefined"),
            Self::SourcesInclude(source) => write!(f, "sourcesInclude({source})"),
            Self::LayersUndefined => f.write_str("layersUndefined"),
            Self::LayersIncludeAny(layers) => {
                write!(f, "layersIncludeAny({})", layers.iter().join(","))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Predicate {
    #[default]
    Always,
    /// A value fixed when the route is built, e.g. whether a service is configured.
    Constant(&'static str, bool),
    Leaf(Leaf),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate left to right, stopping at the first determining operand.
    pub fn eval(&self, ctx: &RequestContext) -> bool {
        match self {
            Self::Always => true,
            Self::Constant(_, value) => *value,
            Self::Leaf(leaf) => leaf.eval(ctx),
            Self::Not(inner) => !inner.eval(ctx),
            Self::All(preds) => preds.iter().all(|p| p.eval(ctx)),
            Self::Any(preds) => preds.iter().any(|p| p.eval(ctx)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Constant(name, value) => write!(f, "{name}={value}"),
            Self::Leaf(leaf) => write!(f, "{leaf}"),
            Self::Not(inner) => write!(f, "not({inner})"),
            Self::All(preds) => write!(f, "all({})", preds.iter().join(", ")),
            Self::Any(preds) => write!(f, "any({})", preds.iter().join(", ")),
        }
    }
}

impl From<Leaf> for Predicate {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

pub fn all(preds: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::All(preds.into_iter().collect())
}

pub fn any(preds: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Any(preds.into_iter().collect())
}

pub fn not(pred: Predicate) -> Predicate {
    Predicate::Not(Box::new(pred))
}

pub fn constant(name: &'static str, value: bool) -> Predicate {
    Predicate::Constant(name, value)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

pub fn has_response_data() -> Predicate {
    Leaf::HasResponseData.into()
}

pub fn has_request_errors() -> Predicate {
    Leaf::HasRequestErrors.into()
}

/// `any(hasResponseData, hasRequestErrors)`
pub fn has_response_data_or_request_errors() -> Predicate {
    any([has_response_data(), has_request_errors()])
}

pub fn has_parsed_text_properties_any(fields: &[&str]) -> Predicate {
    Leaf::HasParsedTextPropertiesAny(strings(fields)).into()
}

pub fn has_parsed_text_properties_all(fields: &[&str]) -> Predicate {
    Leaf::HasParsedTextPropertiesAll(strings(fields)).into()
}

pub fn has_results_at_layers(layers: &[&str]) -> Predicate {
    Leaf::HasResultsAtLayers(strings(layers)).into()
}

pub fn has_request_parameter(name: &str) -> Predicate {
    Leaf::HasRequestParameter(name.to_string()).into()
}

pub fn has_admin_only_results() -> Predicate {
    Leaf::HasAdminOnlyResults.into()
}

pub fn is_only_non_admin_layers() -> Predicate {
    Leaf::IsOnlyNonAdminLayers.into()
}

pub fn is_admin_only_analysis() -> Predicate {
    Leaf::IsAdminOnlyAnalysis.into()
}

pub fn is_request_sources_only_one_provider(source: &str) -> Predicate {
    Leaf::IsRequestSourcesOnlyOneProvider(source.to_string()).into()
}

pub fn is_polygon_request() -> Predicate {
    Leaf::IsPolygonRequest.into()
}

pub fn is_coarse_reverse() -> Predicate {
    Leaf::IsCoarseReverse.into()
}

pub fn is_addressit_parse() -> Predicate {
    Leaf::IsAddressItParse.into()
}

pub fn sources_undefined() -> Predicate {
    Leaf::SourcesUndefined.into()
}

pub fn sources_include(source: &str) -> Predicate {
    Leaf::SourcesInclude(source.to_string()).into()
}

/// Layers unspecified, or at least one of `layers` requested.
pub fn layers_include_any(layers: &[&str]) -> Predicate {
    any([
        Leaf::LayersUndefined.into(),
        Leaf::LayersIncludeAny(strings(layers)).into(),
    ])
}

#[cfg(test)]
mod tests {
    use geocascade_services::MatchRecord;

    use super::*;
    use crate::context::{Clean, ParsedText};

    fn ctx_with_parsed(fields: &[(&str, &str)]) -> RequestContext {
        let parsed: ParsedText = fields.iter().copied().collect();
        RequestContext::new(Clean::new(10).with_parsed_text(parsed))
    }

    #[test]
    fn test_combinators() {
        let ctx = RequestContext::new(Clean::new(10));
        assert!(all(Vec::new()).eval(&ctx), "empty all is true");
        assert!(!any(Vec::new()).eval(&ctx), "empty any is false");
        assert!(not(has_response_data()).eval(&ctx));
        assert!(constant("enabled", true).eval(&ctx));
        assert!(!all([constant("a", true), constant("b", false)]).eval(&ctx));
    }

    #[test]
    fn test_parsed_text_properties() {
        let ctx = ctx_with_parsed(&[("street", "Main St"), ("city", "Springfield")]);
        assert!(has_parsed_text_properties_any(&["query", "street"]).eval(&ctx));
        assert!(!has_parsed_text_properties_all(&["number", "street"]).eval(&ctx));
        assert!(has_parsed_text_properties_all(&["street", "city"]).eval(&ctx));

        let no_parse = RequestContext::new(Clean::new(10));
        assert!(!has_parsed_text_properties_any(&["street"]).eval(&no_parse));
    }

    #[test]
    fn test_admin_only_analysis() {
        assert!(is_admin_only_analysis().eval(&ctx_with_parsed(&[("city", "Paris")])));
        assert!(
            !is_admin_only_analysis()
                .eval(&ctx_with_parsed(&[("city", "Paris"), ("query", "cafe")]))
        );
        assert!(!is_admin_only_analysis().eval(&ctx_with_parsed(&[])));
    }

    #[test]
    fn test_layer_predicates() {
        let venue_only = RequestContext::new(Clean::new(10).with_layers(&["venue", "address"]));
        assert!(is_only_non_admin_layers().eval(&venue_only));
        assert!(!is_coarse_reverse().eval(&venue_only));

        let coarse = RequestContext::new(Clean::new(10).with_layers(&["locality", "country"]));
        assert!(!is_only_non_admin_layers().eval(&coarse));
        assert!(is_coarse_reverse().eval(&coarse));
        assert!(!layers_include_any(&["address", "street"]).eval(&coarse));

        let unspecified = RequestContext::new(Clean::new(10));
        assert!(!is_coarse_reverse().eval(&unspecified));
        assert!(layers_include_any(&["address"]).eval(&unspecified));
    }

    #[test]
    fn test_results_at_layers() {
        let mut ctx = RequestContext::new(Clean::new(10));
        assert!(!has_admin_only_results().eval(&ctx), "no data, no admin results");

        ctx.data.push(MatchRecord::new("wof", "locality", "1"));
        assert!(has_admin_only_results().eval(&ctx));
        assert!(!has_results_at_layers(&["street"]).eval(&ctx));

        ctx.data.push(MatchRecord::new("osm", "street", "2"));
        assert!(!has_admin_only_results().eval(&ctx));
        assert!(has_results_at_layers(&["street"]).eval(&ctx));
    }

    #[test]
    fn test_sources() {
        let ctx = RequestContext::new(Clean::new(10).with_sources(&["whosonfirst"]));
        assert!(is_request_sources_only_one_provider("whosonfirst").eval(&ctx));
        assert!(sources_include("whosonfirst").eval(&ctx));
        assert!(!sources_undefined().eval(&ctx));

        let mixed = RequestContext::new(Clean::new(10).with_sources(&["whosonfirst", "osm"]));
        assert!(!is_request_sources_only_one_provider("whosonfirst").eval(&mixed));
    }

    #[test]
    fn test_polygon_request() {
        let ctx = RequestContext::new(Clean::new(10).with_geometries("point,polygon"));
        assert!(is_polygon_request().eval(&ctx));
        let ctx = RequestContext::new(Clean::new(10).with_geometries("point"));
        assert!(!is_polygon_request().eval(&ctx));
    }

    #[test]
    fn test_display() {
        let guard = all([
            not(has_request_errors()),
            has_parsed_text_properties_any(&["street"]),
        ]);
        assert_eq!(
            guard.to_string(),
            "all(not(hasRequestErrors), hasParsedTextProperties.any(street))"
        );
    }
}
