use tracing::debug;

use crate::context::RequestContext;

/// Result layers from most to least granular for free text fallback queries.
const GRANULARITY: [&str; 17] = [
    "venue",
    "address",
    "street",
    "postalcode",
    "neighbourhood",
    "borough",
    "locality",
    "localadmin",
    "county",
    "macrocounty",
    "region",
    "macroregion",
    "dependency",
    "country",
    "empire",
    "continent",
    "ocean",
];

/// Structured queries rank postal codes below the localities they sit in.
const STRUCTURED_GRANULARITY: [&str; 17] = [
    "venue",
    "address",
    "street",
    "neighbourhood",
    "borough",
    "locality",
    "localadmin",
    "postalcode",
    "county",
    "macrocounty",
    "region",
    "macroregion",
    "dependency",
    "country",
    "empire",
    "continent",
    "ocean",
];

fn trim(ctx: &mut RequestContext, query_type: &str, layers: &[&str]) {
    if ctx.meta.query_type() != Some(query_type) {
        return;
    }
    let Some(layer) = layers
        .iter()
        .find(|layer| ctx.data.iter().any(|r| r.layer == **layer))
    else {
        return;
    };

    let before = ctx.data.len();
    ctx.data.retain(|r| r.layer == *layer);
    debug!(layer, before, after = ctx.data.len(), "Trimmed by granularity");
}

/// Keep only the most granular layer present in a fallback query's results.
pub fn trim_by_granularity(ctx: &mut RequestContext) {
    trim(ctx, "fallback", &GRANULARITY);
}

/// Same as [`trim_by_granularity`] for structured queries.
pub fn trim_by_granularity_structured(ctx: &mut RequestContext) {
    trim(ctx, "structured", &STRUCTURED_GRANULARITY);
}

#[cfg(test)]
mod tests {
    use geocascade_services::MatchRecord;

    use super::*;
    use crate::context::Clean;

    fn ctx(query_type: &str, layers: &[&str]) -> RequestContext {
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.meta.set_query_type(query_type);
        ctx.data = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| MatchRecord::new("osm", *layer, i.to_string()))
            .collect();
        ctx
    }

    #[test]
    fn test_keeps_most_granular_layer() {
        let mut ctx = ctx("fallback", &["region", "locality", "country", "locality"]);
        trim_by_granularity(&mut ctx);
        assert_eq!(ctx.data.len(), 2);
        assert!(ctx.data.iter().all(|r| r.layer == "locality"));
    }

    #[test]
    fn test_other_query_types_untouched() {
        let mut ctx = ctx("original", &["region", "locality"]);
        trim_by_granularity(&mut ctx);
        assert_eq!(ctx.data.len(), 2);
    }

    #[test]
    fn test_structured_ranks_postalcode_below_locality() {
        let mut ctx = ctx("structured", &["postalcode", "locality"]);
        trim_by_granularity_structured(&mut ctx);
        assert_eq!(ctx.data[0].layer, "locality");
        assert_eq!(ctx.data.len(), 1);
    }
}
