use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};

use crate::{
    context::{ParsedText, RequestContext, TextParser},
    pipeline::{StageEffect, StageError},
};

/// Rule based fallback analyzer for free text addresses.
///
/// The first comma separated segment is either `<number> <street>` or a free query; the
/// trailing segments are read as city, state and country in that order. A postal code may
/// appear in any trailing segment.
#[derive(Debug, Clone)]
pub struct AddressitAnalyzer {
    house: Regex,
    postcode: Regex,
}

impl AddressitAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            house: Regex::new(r"^(\d+[a-zA-Z]?(?:-\d+)?)\s+(.+)$")?,
            postcode: Regex::new(r"\b(\d{5}(?:-\d{4})?|[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2})\b")?,
        })
    }

    pub fn analyze(&self, text: &str) -> ParsedText {
        let mut parsed = ParsedText::new();
        let mut segments = text.split(',').map(str::trim).filter(|s| !s.is_empty());

        let Some(head) = segments.next() else {
            return parsed;
        };
        match self.house.captures(head) {
            Some(caps) => {
                parsed.insert("number", &caps[1]);
                parsed.insert("street", &caps[2]);
            }
            None => parsed.insert("query", head),
        }

        let admin_fields = ["city", "state", "country"];
        for (field, segment) in admin_fields.into_iter().zip(segments) {
            let mut rest = segment.to_string();
            if let Some(m) = self.postcode.find(segment) {
                parsed.insert("postalcode", m.as_str());
                rest = format!("{}{}", &segment[..m.start()], &segment[m.end()..]);
            }
            parsed.insert(field, rest.trim());
        }
        parsed
    }
}

/// Re-parses `clean.text` with [`AddressitAnalyzer`], replacing the earlier parse.
#[derive(Debug, Clone)]
pub struct DeferToAddressit {
    analyzer: AddressitAnalyzer,
}

impl DeferToAddressit {
    pub fn new(analyzer: AddressitAnalyzer) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl StageEffect for DeferToAddressit {
    #[instrument(name = "Defer to addressit", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(text) = ctx.clean.text.as_deref() else {
            return Ok(());
        };
        let parsed = self.analyzer.analyze(text);
        debug!(parsed = ?parsed, "Addressit parse");
        ctx.clean.parsed_text = Some(parsed);
        ctx.clean.parser = Some(TextParser::Addressit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Clean;

    #[test]
    fn test_number_and_street() {
        let analyzer = AddressitAnalyzer::new().unwrap();
        let parsed = analyzer.analyze("30 W 26th St, New York, NY 10010");
        assert_eq!(parsed.get("number"), Some("30"));
        assert_eq!(parsed.get("street"), Some("W 26th St"));
        assert_eq!(parsed.get("city"), Some("New York"));
        assert_eq!(parsed.get("state"), Some("NY"));
        assert_eq!(parsed.get("postalcode"), Some("10010"));
    }

    #[test]
    fn test_free_query() {
        let analyzer = AddressitAnalyzer::new().unwrap();
        let parsed = analyzer.analyze("Brandenburg Gate, Berlin");
        assert_eq!(parsed.get("query"), Some("Brandenburg Gate"));
        assert_eq!(parsed.get("city"), Some("Berlin"));
        assert!(!parsed.has("number"));
    }

    #[test]
    fn test_postcode_only_segment_leaves_no_city() {
        let analyzer = AddressitAnalyzer::new().unwrap();
        let parsed = analyzer.analyze("10 Downing Street, SW1A 2AA");
        assert_eq!(parsed.get("postalcode"), Some("SW1A 2AA"));
        assert!(!parsed.has("city"));
    }

    #[tokio::test]
    async fn test_stage_sets_parser() {
        let mut ctx = RequestContext::new(Clean::new(10).with_text("1 Main St, Springfield"));
        DeferToAddressit::new(AddressitAnalyzer::new().unwrap())
            .apply(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.clean.parser, Some(TextParser::Addressit));
        assert_eq!(ctx.clean.parsed("street"), Some("Main St"));
    }
}
