//! Named guards shared by the route definitions.

use crate::predicates::{
    ADMIN_PARSED_FIELDS, Predicate, all, any, constant, has_admin_only_results,
    has_parsed_text_properties_all, has_parsed_text_properties_any, has_request_errors,
    has_request_parameter, has_response_data, has_response_data_or_request_errors,
    has_results_at_layers, is_addressit_parse, is_admin_only_analysis, is_coarse_reverse,
    is_only_non_admin_layers, is_polygon_request, is_request_sources_only_one_provider,
    layers_include_any, not, sources_include, sources_undefined,
};

const GAZETTEER_SOURCE: &str = "whosonfirst";
const ADDRESS_LAYERS: [&str; 2] = ["address", "street"];

/// Which optional services are usable, fixed when the routes are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enabled {
    pub libpostal: bool,
    pub placeholder: bool,
    pub pip: bool,
    pub interpolation: bool,
    pub language: bool,
}

/// Guard expressions for every conditional stage.
#[derive(Debug, Clone)]
pub struct Guards {
    enabled: Enabled,
}

fn sources_are_gazetteer_only() -> Predicate {
    is_request_sources_only_one_provider(GAZETTEER_SOURCE)
}

fn parsed_has_query_or_category() -> Predicate {
    has_parsed_text_properties_any(&["query", "category"])
}

fn parsed_has_street() -> Predicate {
    has_parsed_text_properties_any(&["street"])
}

impl Guards {
    pub fn new(enabled: Enabled) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> Enabled {
        self.enabled
    }

    fn libpostal_enabled(&self) -> Predicate {
        constant("isLibpostalServiceEnabled", self.enabled.libpostal)
    }

    fn placeholder_enabled(&self) -> Predicate {
        constant("isPlaceholderServiceEnabled", self.enabled.placeholder)
    }

    fn pip_enabled(&self) -> Predicate {
        constant("isPipServiceEnabled", self.enabled.pip)
    }

    fn interpolation_enabled(&self) -> Predicate {
        constant("isInterpolationEnabled", self.enabled.interpolation)
    }

    fn language_enabled(&self) -> Predicate {
        constant("isChangeLanguageEnabled", self.enabled.language)
    }

    pub fn libpostal(&self) -> Predicate {
        all([
            not(has_request_errors()),
            self.libpostal_enabled(),
            not(sources_are_gazetteer_only()),
        ])
    }

    pub fn structured_libpostal(&self) -> Predicate {
        all([
            not(has_request_errors()),
            self.libpostal_enabled(),
            has_parsed_text_properties_all(&["address"]),
        ])
    }

    /// Resolve an admin-only parse, or a gazetteer-only request, against the gazetteer.
    pub fn placeholder_geodisambiguation(&self) -> Predicate {
        all([
            not(has_response_data_or_request_errors()),
            self.placeholder_enabled(),
            not(any([
                is_only_non_admin_layers(),
                has_request_parameter("categories"),
            ])),
            any([
                sources_are_gazetteer_only(),
                all([
                    is_admin_only_analysis(),
                    any([sources_undefined(), sources_include(GAZETTEER_SOURCE)]),
                ]),
            ]),
        ])
    }

    /// Look up the admin parents of a parsed street so the backend can search by id.
    pub fn placeholder_ids_lookup(&self) -> Predicate {
        all([
            not(has_response_data_or_request_errors()),
            self.placeholder_enabled(),
            layers_include_any(&ADDRESS_LAYERS),
            parsed_has_street(),
            not(parsed_has_query_or_category()),
            has_parsed_text_properties_any(&ADMIN_PARSED_FIELDS),
        ])
    }

    pub fn placeholder_should_have_run(&self) -> Predicate {
        any([
            self.placeholder_geodisambiguation(),
            self.placeholder_ids_lookup(),
        ])
    }

    pub fn placeholder_geometries() -> Predicate {
        all([
            has_response_data(),
            not(has_request_errors()),
            is_polygon_request(),
        ])
    }

    pub fn search_with_ids() -> Predicate {
        all([
            not(has_request_errors()),
            not(parsed_has_query_or_category()),
            layers_include_any(&ADDRESS_LAYERS),
            parsed_has_street(),
        ])
    }

    pub fn fallback_query(&self) -> Predicate {
        all([
            not(has_request_errors()),
            not(has_response_data()),
            not(self.placeholder_should_have_run()),
        ])
    }

    /// No results yet, or only admin areas for a parse that asked for something finer.
    pub fn defer_to_addressit() -> Predicate {
        all([
            not(has_request_errors()),
            any([
                not(has_response_data()),
                all([
                    has_admin_only_results(),
                    not(is_admin_only_analysis()),
                    not(sources_are_gazetteer_only()),
                ]),
            ]),
        ])
    }

    pub fn old_prod_query() -> Predicate {
        all([not(has_request_errors()), is_addressit_parse()])
    }

    pub fn interpolation(&self) -> Predicate {
        all([
            not(has_request_errors()),
            self.interpolation_enabled(),
            has_parsed_text_properties_all(&["number", "street"]),
            has_results_at_layers(&["street"]),
        ])
    }

    pub fn change_language(&self) -> Predicate {
        all([
            has_response_data(),
            not(has_request_errors()),
            self.language_enabled(),
            has_request_parameter("lang"),
        ])
    }

    pub fn non_coarse_reverse(&self) -> Predicate {
        all([
            not(has_response_data_or_request_errors()),
            any([not(is_coarse_reverse()), not(self.pip_enabled())]),
        ])
    }

    pub fn coarse_reverse(&self) -> Predicate {
        all([
            self.pip_enabled(),
            not(has_request_errors()),
            not(has_response_data()),
            not(is_only_non_admin_layers()),
        ])
    }

    /// Plain "nothing yet and nothing wrong".
    pub fn first_search() -> Predicate {
        not(has_response_data_or_request_errors())
    }

    pub fn sort() -> Predicate {
        has_admin_only_results()
    }

    pub fn place() -> Predicate {
        not(has_request_errors())
    }
}
