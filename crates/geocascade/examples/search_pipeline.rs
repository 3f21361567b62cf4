//! Run a free-text search through the full fallback cascade
//!
//! This example wires the routes to the in-memory services so it runs without any
//! backend. It demonstrates:
//! - Building the routes from an `ApiConfig`
//! - The gazetteer id lookup followed by a search constrained to those ids
//! - Reading the stage trace and the GeoJSON response

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use geocascade::{
    ApiConfigBuilder, Clean, RequestContext, Routes, Services,
    services::{
        GazetteerGeometry, GazetteerPlace, LineageEntry, MatchRecord, QueryKind,
        memory::{MemoryGazetteer, MemoryParser, MemorySearchBackend},
    },
};
use serde_json::json;
use tracing::{Level, info};

fn gazetteer() -> MemoryGazetteer {
    MemoryGazetteer::new(vec![GazetteerPlace {
        id: 101_750_367,
        name: "Berlin".to_string(),
        placetype: "locality".to_string(),
        population: Some(3_645_000),
        lineage: vec![BTreeMap::from([(
            "country".to_string(),
            LineageEntry {
                id: 85_633_111,
                name: "Germany".to_string(),
                abbr: Some("DEU".to_string()),
            },
        )])],
        geom: Some(GazetteerGeometry {
            bbox: Some("13.08,52.33,13.76,52.67".to_string()),
            lat: 52.52,
            lon: 13.40,
        }),
    }])
}

#[tokio::main]
async fn main() -> Result<()> {
    geocascade::init_logging(Level::DEBUG)?;

    let mut address = MatchRecord::new("openaddresses", "address", "de-berlin-4711")
        .with_name("1 Pariser Platz")
        .with_centroid(52.5163, 13.3777)
        .with_parent("locality", "Berlin", "101750367")
        .with_parent("country", "Germany", "85633111");
    address.parent.insert("country_a".to_string(), json!(["DEU"]));
    address.address_parts.insert("number".to_string(), json!("1"));
    address
        .address_parts
        .insert("street".to_string(), json!("Pariser Platz"));
    let backend =
        MemorySearchBackend::new().with_results(QueryKind::AddressUsingIds, vec![address]);
    let parser = MemoryParser::new().with_response(
        "Pariser Platz 1, Berlin",
        &[
            ("road", "Pariser Platz"),
            ("house_number", "1"),
            ("city", "Berlin"),
        ],
    );

    let config = ApiConfigBuilder::local_services().build()?;
    let services = Services::new(Arc::new(backend))
        .with_parser(Arc::new(parser))
        .with_gazetteer(Arc::new(gazetteer()));
    let routes = Routes::new(&config, services)?;

    let request = RequestContext::new(
        Clean::new(config.result_size(None)).with_text("Pariser Platz 1, Berlin"),
    );
    let output = routes.search.handle(request).await;

    info!(
        executed = ?output.trace.executed,
        skipped = ?output.trace.skipped,
        "Search route finished"
    );
    println!("{}", serde_json::to_string_pretty(&output.response)?);
    Ok(())
}
