use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use geocascade_services::{AddressParser, ParsedComponent};
use itertools::Itertools;
use tracing::{debug, error, instrument, warn};

use crate::{
    context::{ParsedText, RequestContext, TextParser},
    pipeline::{StageEffect, StageError},
};

/// Parser label to parsed-text field. Labels not listed here are dropped.
fn field_for_label(label: &str) -> Option<&'static str> {
    Some(match label {
        "house" => "query",
        "category" => "category",
        "house_number" => "number",
        "road" => "street",
        "unit" => "unit",
        "suburb" => "neighbourhood",
        "city_district" => "borough",
        "city" => "city",
        "state_district" => "county",
        "state" => "state",
        "postcode" => "postalcode",
        "country" => "country",
        _ => return None,
    })
}

fn has_repeated_label(components: &[ParsedComponent]) -> bool {
    components
        .iter()
        .counts_by(|c| c.label.as_str())
        .values()
        .any(|&count| count > 1)
}

/// Free-text address parsing into `clean.parsed_text`.
///
/// Parser failures are logged and leave the request untouched, so the text can still be
/// handled by the later fallbacks.
pub struct Libpostal {
    parser: Arc<dyn AddressParser>,
}

impl Libpostal {
    pub fn new(parser: Arc<dyn AddressParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl StageEffect for Libpostal {
    #[instrument(name = "Libpostal", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(text) = ctx.clean.text.clone() else {
            return Ok(());
        };
        let t = Instant::now();

        let components = match self.parser.parse(&text).await {
            Ok(components) => components,
            Err(e) => {
                error!(error = %e, "Address parser failed");
                return Ok(());
            }
        };

        if has_repeated_label(&components) {
            warn!(
                text = %text,
                "Address parser returned a repeated label, ignoring its response"
            );
            return Ok(());
        }

        let parsed: ParsedText = components
            .iter()
            .filter_map(|c| field_for_label(&c.label).map(|field| (field, c.value.as_str())))
            .collect();

        debug!(parsed = ?parsed, elapsed_ms = ?t.elapsed(), "Parsed text");
        ctx.clean.parsed_text = Some(parsed);
        ctx.clean.parser = Some(TextParser::Libpostal);
        Ok(())
    }
}

/// Splits `parsed_text.address` of a structured request into `number` and `street`.
pub struct StructuredLibpostal {
    parser: Arc<dyn AddressParser>,
}

impl StructuredLibpostal {
    pub fn new(parser: Arc<dyn AddressParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl StageEffect for StructuredLibpostal {
    #[instrument(name = "Structured libpostal", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(address) = ctx.clean.parsed("address").map(ToString::to_string) else {
            return Ok(());
        };

        let components = self.parser.parse(&address).await.unwrap_or_else(|e| {
            error!(error = %e, "Address parser failed, using the whole address as street");
            Vec::new()
        });

        let parsed = ctx.clean.parsed_text.get_or_insert_with(ParsedText::new);
        parsed.remove("address");

        let value_of = |label: &str| {
            components
                .iter()
                .find(|c| c.label == label)
                .map(|c| c.value.clone())
        };
        if let Some(number) = value_of("house_number") {
            parsed.insert("number", number);
        }
        match value_of("road") {
            Some(street) => parsed.insert("street", street),
            None => parsed.insert("street", &address),
        }
        ctx.clean.parser = Some(TextParser::Libpostal);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::memory::MemoryParser;

    use super::*;
    use crate::context::Clean;

    #[tokio::test]
    async fn test_maps_labels_into_parsed_text() {
        let parser = MemoryParser::new().with_response(
            "30 w 26th st, new york",
            &[
                ("house_number", "30"),
                ("road", "w 26th st"),
                ("city", "new york"),
                ("po_box", "ignored"),
            ],
        );
        let effect = Libpostal::new(Arc::new(parser));
        let mut ctx = RequestContext::new(Clean::new(10).with_text("30 w 26th st, new york"));

        effect.apply(&mut ctx).await.unwrap();

        let parsed = ctx.clean.parsed_text.as_ref().unwrap();
        assert_eq!(parsed.get("number"), Some("30"));
        assert_eq!(parsed.get("street"), Some("w 26th st"));
        assert_eq!(parsed.get("city"), Some("new york"));
        assert_eq!(parsed.as_map().len(), 3, "unknown labels are dropped");
        assert_eq!(ctx.clean.parser, Some(TextParser::Libpostal));
    }

    #[tokio::test]
    async fn test_repeated_label_is_ignored() {
        let parser = MemoryParser::new().with_response(
            "main st main st",
            &[("road", "main st"), ("road", "main st")],
        );
        let effect = Libpostal::new(Arc::new(parser));
        let mut ctx = RequestContext::new(Clean::new(10).with_text("main st main st"));

        effect.apply(&mut ctx).await.unwrap();

        assert!(ctx.clean.parsed_text.is_none());
        assert!(ctx.errors.is_empty());
    }

    #[tokio::test]
    async fn test_parser_failure_is_not_a_request_error() {
        let effect = Libpostal::new(Arc::new(MemoryParser::new().failing("down")));
        let mut ctx = RequestContext::new(Clean::new(10).with_text("anything"));

        effect.apply(&mut ctx).await.unwrap();

        assert!(ctx.errors.is_empty());
        assert!(ctx.clean.parser.is_none());
    }

    #[tokio::test]
    async fn test_structured_without_road_uses_whole_address() {
        let parsed: ParsedText = [("address", "Unter den Linden"), ("city", "Berlin")]
            .into_iter()
            .collect();
        let effect = StructuredLibpostal::new(Arc::new(MemoryParser::new()));
        let mut ctx = RequestContext::new(Clean::new(10).with_parsed_text(parsed));

        effect.apply(&mut ctx).await.unwrap();

        let parsed = ctx.clean.parsed_text.as_ref().unwrap();
        assert_eq!(parsed.get("street"), Some("Unter den Linden"));
        assert_eq!(parsed.get("city"), Some("Berlin"));
        assert!(!parsed.has("address"));
    }

    #[tokio::test]
    async fn test_structured_splits_number_and_street() {
        let parsed: ParsedText = [("address", "1 Main St")].into_iter().collect();
        let parser =
            MemoryParser::new().with_response("1 Main St", &[("house_number", "1"), ("road", "Main St")]);
        let effect = StructuredLibpostal::new(Arc::new(parser));
        let mut ctx = RequestContext::new(Clean::new(10).with_parsed_text(parsed));

        effect.apply(&mut ctx).await.unwrap();

        let parsed = ctx.clean.parsed_text.as_ref().unwrap();
        assert_eq!(parsed.get("number"), Some("1"));
        assert_eq!(parsed.get("street"), Some("Main St"));
    }
}
