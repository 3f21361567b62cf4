//! Geocascade - query orchestration for a geocoding search API
//!
//! Geocascade sits between a sanitized geocoding request and the external services that can
//! answer it: an address parser, an administrative-area gazetteer, a point-in-polygon
//! service, an interpolation service, a language service and the search index itself. Each
//! endpoint is a [`Route`]: an ordered pipeline of guarded stages followed by a GeoJSON
//! responder.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use geocascade::services::{MatchRecord, QueryKind, memory::MemorySearchBackend};
//! use geocascade::{ApiConfigBuilder, Clean, RequestContext, Routes, Services};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> geocascade::Result<()> {
//! let backend = MemorySearchBackend::new().with_results(
//!     QueryKind::Fallback,
//!     vec![MatchRecord::new("openstreetmap", "venue", "1").with_name("Cafe").with_centroid(51.5, -0.1)],
//! );
//! let config = ApiConfigBuilder::new().build()?;
//! let routes = Routes::new(&config, Services::new(Arc::new(backend)))?;
//!
//! let output = routes
//!     .search
//!     .handle(RequestContext::new(Clean::new(10).with_text("cafe")))
//!     .await;
//! assert_eq!(output.response.collection.features.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Layout
//!
//! - [`pipeline`]: guarded, strictly sequential stage execution.
//! - [`predicates`]: the guard expressions stages are gated on.
//! - [`controllers`]: stages that call external services.
//! - [`postprocess`]: stages that only reshape `data`.
//! - [`geojson`]: the response assembler.
//! - [`routes`]: the stage lists for each endpoint.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod config;
pub mod context;
pub mod controllers;
pub mod error;
pub mod geojson;
pub mod pipeline;
pub mod postprocess;
pub mod predicates;
pub mod routes;
pub mod sanitizer;

pub use config::{ApiConfig, ApiConfigBuilder, ServicesConfig};
pub use context::{Clean, ParsedText, RequestContext};
pub use error::{GeocascadeError, Result};
pub use geocascade_services as services;
pub use geojson::{GeocodeJson, GeocodeResponse, Responder};
pub use pipeline::{Pipeline, Stage, StageEffect, Trace};
pub use routes::{Route, RouteOutput, Routes, Services};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for geocascade.
///
/// `RUST_LOG` takes precedence over `level` when set. Safe to call more than once; only the
/// first call installs the subscriber.
///
/// ```rust
/// use tracing::Level;
///
/// geocascade::init_logging(Level::INFO)?;
/// # Ok::<(), geocascade::GeocascadeError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static ()> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
