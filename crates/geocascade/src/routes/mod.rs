//! Per-endpoint stage lists.
//!
//! Each route is a [`Pipeline`] followed by a [`Responder`]. The search route implements
//! the full fallback cascade: parser, gazetteer geodisambiguation, gazetteer id lookup,
//! search by ids, cascading fallback search, then the legacy parser and its query. The
//! other routes reuse the same post-processing tail with the search-specific stages left
//! out.

mod guards;
mod services;

use std::{future::Future, sync::Arc};

pub use guards::{Enabled, Guards};
use geocascade_services::QueryKind;
pub use services::Services;
use tracing::{info, instrument};

use crate::{
    config::ApiConfig,
    context::RequestContext,
    controllers::{
        CoarseReverse, Libpostal, Place, Placeholder, PlaceholderGeometries, Search,
        SearchWithIds, StructuredLibpostal,
    },
    error::Result,
    geojson::{GeocodeJson, GeocodeResponse, Responder},
    pipeline::{Pipeline, PipelineError, Stage, Trace},
    postprocess::{
        ChangeLanguage, Interpolate, assign_labels, compute_distances, confidence_score,
        confidence_score_fallback, confidence_score_reverse, dedupe, local_naming_conventions,
        normalize_parent_ids, parse_bounding_boxes, rename_placenames, set_accuracy,
        sort_response_data, trim_by_granularity, trim_by_granularity_structured,
    },
    sanitizer::{AddressitAnalyzer, DeferToAddressit},
};

/// Everything a route produced for one request.
#[derive(Debug)]
pub struct RouteOutput {
    pub context: RequestContext,
    pub trace: Trace,
    pub response: GeocodeResponse,
}

/// A pipeline plus the responder that renders its final context.
#[derive(Clone)]
pub struct Route {
    pipeline: Pipeline,
    responder: Arc<dyn Responder>,
    max_size: usize,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pipeline", &self.pipeline)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new(pipeline: Pipeline, responder: Arc<dyn Responder>) -> Self {
        Self {
            pipeline,
            responder,
            max_size: usize::MAX,
        }
    }

    /// Cap `clean.size` at `max_size`, warning when a request asks for more.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    fn limit_size(&self, ctx: &mut RequestContext) {
        let requested = ctx.clean.size;
        let size = requested.clamp(1, self.max_size.max(1));
        if size != requested {
            ctx.push_warning(format!("out-of-range integer 'size', using {size}"));
            ctx.clean.size = size;
        }
    }

    pub fn name(&self) -> &'static str {
        self.pipeline.name()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline on a sanitized context and render the response.
    #[instrument(name = "Route", level = "info", skip_all, fields(route = self.name()))]
    pub async fn handle(&self, mut ctx: RequestContext) -> RouteOutput {
        self.limit_size(&mut ctx);
        let trace = self.pipeline.run(&mut ctx).await;
        let response = self.responder.respond(&mut ctx);
        info!(
            features = response.collection.features.len(),
            is_error = response.is_error(),
            "Request handled"
        );
        RouteOutput {
            context: ctx,
            trace,
            response,
        }
    }

    /// As [`Route::handle`], abandoning the request if `cancel` resolves first.
    pub async fn handle_until_cancelled<C>(
        &self,
        mut ctx: RequestContext,
        cancel: C,
    ) -> std::result::Result<RouteOutput, PipelineError>
    where
        C: Future<Output = ()> + Send,
    {
        self.limit_size(&mut ctx);
        let trace = self.pipeline.run_until_cancelled(&mut ctx, cancel).await?;
        let response = self.responder.respond(&mut ctx);
        Ok(RouteOutput {
            context: ctx,
            trace,
            response,
        })
    }
}

/// Stage factory shared by all routes.
struct Builder {
    config: ApiConfig,
    services: Services,
    guards: Guards,
    analyzer: AddressitAnalyzer,
}

impl Builder {
    fn search(&self, kind: QueryKind) -> Search {
        Search::new(self.services.backend.clone(), kind)
    }

    fn placeholder(&self, geometric_filters: bool) -> Option<Placeholder> {
        self.services
            .gazetteer
            .clone()
            .map(|gazetteer| Placeholder::new(gazetteer, geometric_filters))
    }

    fn placeholder_geometries(&self) -> Stage {
        Stage::new(
            "placeholder_geometries",
            PlaceholderGeometries::new(self.services.backend.clone(), &self.config.index_name),
        )
        .when(Guards::placeholder_geometries())
    }

    /// Post-processing shared by every route, from accuracy through labels.
    fn common_tail(&self, mut pipeline: Pipeline) -> Pipeline {
        pipeline = pipeline
            .stage(Stage::sync("accuracy", set_accuracy))
            .stage(Stage::sync(
                "local_naming_conventions",
                local_naming_conventions(self.config.flip_number_and_street_countries.clone()),
            ))
            .stage(Stage::sync("rename_placenames", rename_placenames))
            .stage(Stage::sync("parse_bounding_box", parse_bounding_boxes))
            .stage(Stage::sync("normalize_parent_ids", normalize_parent_ids));
        if let Some(language) = self.services.language.clone() {
            pipeline = pipeline.stage(
                Stage::new("change_language", ChangeLanguage::new(language))
                    .when(self.guards.change_language()),
            );
        }
        pipeline.stage(Stage::sync("assign_labels", assign_labels))
    }

    fn interpolate(&self, pipeline: Pipeline) -> Pipeline {
        match self.services.interpolator.clone() {
            Some(interpolator) => pipeline.stage(
                Stage::new("interpolate", Interpolate::new(interpolator))
                    .when(self.guards.interpolation()),
            ),
            None => pipeline,
        }
    }

    fn search_route(&self) -> Pipeline {
        let mut pipeline = Pipeline::new("search");
        if let Some(parser) = self.services.parser.clone() {
            pipeline =
                pipeline.stage(Stage::new("libpostal", Libpostal::new(parser)).when(self.guards.libpostal()));
        }
        if let Some(placeholder) = self.placeholder(true) {
            pipeline = pipeline.stage(
                Stage::new("placeholder_geodisambiguation", placeholder)
                    .when(self.guards.placeholder_geodisambiguation()),
            );
        }
        if let Some(placeholder) = self.placeholder(false) {
            pipeline = pipeline.stage(
                Stage::new("placeholder_ids_lookup", placeholder)
                    .when(self.guards.placeholder_ids_lookup()),
            );
        }
        pipeline = pipeline
            .stage(self.placeholder_geometries())
            .stage(
                Stage::new(
                    "search_with_ids",
                    SearchWithIds::new(self.services.backend.clone()),
                )
                .when(Guards::search_with_ids()),
            )
            .stage(
                Stage::new("fallback_search", self.search(QueryKind::Fallback))
                    .when(self.guards.fallback_query()),
            )
            .stage(
                Stage::new("defer_to_addressit", DeferToAddressit::new(self.analyzer.clone()))
                    .when(Guards::defer_to_addressit()),
            )
            .stage(
                Stage::new("original_search", self.search(QueryKind::Original))
                    .when(Guards::old_prod_query()),
            )
            .stage(Stage::sync("trim_by_granularity", trim_by_granularity))
            .stage(Stage::sync("distances", compute_distances))
            .stage(Stage::sync("confidence_scores", confidence_score))
            .stage(Stage::sync("confidence_scores_fallback", confidence_score_fallback));
        pipeline = self.interpolate(pipeline)
            .stage(Stage::sync("sort", sort_response_data).when(Guards::sort()))
            .stage(Stage::sync("dedupe", dedupe));
        self.common_tail(pipeline)
    }

    fn structured_route(&self) -> Pipeline {
        let mut pipeline = Pipeline::new("structured");
        if let Some(parser) = self.services.parser.clone() {
            pipeline = pipeline.stage(
                Stage::new("structured_libpostal", StructuredLibpostal::new(parser))
                    .when(self.guards.structured_libpostal()),
            );
        }
        pipeline = pipeline
            .stage(
                Stage::new("structured_search", self.search(QueryKind::Structured))
                    .when(Guards::first_search()),
            )
            .stage(Stage::sync(
                "trim_by_granularity_structured",
                trim_by_granularity_structured,
            ))
            .stage(Stage::sync("distances", compute_distances))
            .stage(Stage::sync("confidence_scores", confidence_score))
            .stage(Stage::sync("confidence_scores_fallback", confidence_score_fallback));
        pipeline = self.interpolate(pipeline).stage(Stage::sync("dedupe", dedupe));
        self.common_tail(pipeline)
    }

    fn autocomplete_route(&self) -> Pipeline {
        let pipeline = Pipeline::new("autocomplete")
            .stage(
                Stage::new("autocomplete_search", self.search(QueryKind::Autocomplete))
                    .when(Guards::first_search()),
            )
            .stage(Stage::sync("distances", compute_distances))
            .stage(Stage::sync("confidence_scores", confidence_score))
            .stage(Stage::sync("dedupe", dedupe));
        self.common_tail(pipeline)
    }

    fn reverse_route(&self, name: &'static str) -> Pipeline {
        let mut pipeline = Pipeline::new(name).stage(
            Stage::new("reverse_search", self.search(QueryKind::Reverse))
                .when(self.guards.non_coarse_reverse()),
        );
        if let Some(pip) = self.services.pip.clone() {
            pipeline = pipeline.stage(
                Stage::new("coarse_reverse", CoarseReverse::new(pip))
                    .when(self.guards.coarse_reverse()),
            );
        }
        pipeline = pipeline
            .stage(Stage::sync("distances", compute_distances))
            .stage(Stage::sync("confidence_scores_reverse", confidence_score_reverse))
            .stage(Stage::sync("dedupe", dedupe));
        self.common_tail(pipeline)
    }

    fn place_route(&self) -> Pipeline {
        let pipeline = Pipeline::new("place")
            .stage(
                Stage::new(
                    "place",
                    Place::new(self.services.backend.clone(), &self.config.index_name),
                )
                .when(Guards::place()),
            )
            .stage(self.placeholder_geometries());
        self.common_tail(pipeline)
    }
}

/// Every route, built once from the configuration and the service handles.
#[derive(Debug, Clone)]
pub struct Routes {
    pub search: Route,
    pub structured: Route,
    pub autocomplete: Route,
    pub reverse: Route,
    pub nearby: Route,
    pub place: Route,
}

impl Routes {
    /// A service counts as enabled when it is both configured and has a client in `services`.
    pub fn new(config: &ApiConfig, services: Services) -> Result<Self> {
        let enabled = Enabled {
            libpostal: config.is_libpostal_enabled() && services.parser.is_some(),
            placeholder: config.is_placeholder_enabled() && services.gazetteer.is_some(),
            pip: config.is_pip_enabled() && services.pip.is_some(),
            interpolation: config.is_interpolation_enabled() && services.interpolator.is_some(),
            language: config.is_language_enabled() && services.language.is_some(),
        };
        info!(enabled = ?enabled, index = %config.index_name, "Building routes");

        let builder = Builder {
            config: config.clone(),
            services,
            guards: Guards::new(enabled),
            analyzer: AddressitAnalyzer::new().map_err(anyhow::Error::from)?,
        };
        let responder: Arc<dyn Responder> = Arc::new(GeocodeJson::new(config));
        let route =
            |pipeline| Route::new(pipeline, responder.clone()).with_max_size(config.max_size);

        Ok(Self {
            search: route(builder.search_route()),
            structured: route(builder.structured_route()),
            autocomplete: route(builder.autocomplete_route()),
            reverse: route(builder.reverse_route("reverse")),
            nearby: route(builder.reverse_route("nearby")),
            place: route(builder.place_route()),
        })
    }

    /// Clients for every configured service, then the routes over them.
    #[cfg(feature = "http")]
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(config, Services::from_config(config)?)
    }
}
