use std::sync::Arc;

use geocascade_services::{
    AddressParser, Gazetteer, Interpolator, LanguageService, PointInPolygon, SearchBackend,
};

/// Shared handles to every service a route may call.
///
/// Cloning is cheap. Optional services that are absent are treated as disabled.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn SearchBackend>,
    pub parser: Option<Arc<dyn AddressParser>>,
    pub gazetteer: Option<Arc<dyn Gazetteer>>,
    pub pip: Option<Arc<dyn PointInPolygon>>,
    pub interpolator: Option<Arc<dyn Interpolator>>,
    pub language: Option<Arc<dyn LanguageService>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("parser", &self.parser.is_some())
            .field("gazetteer", &self.gazetteer.is_some())
            .field("pip", &self.pip.is_some())
            .field("interpolator", &self.interpolator.is_some())
            .field("language", &self.language.is_some())
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            parser: None,
            gazetteer: None,
            pip: None,
            interpolator: None,
            language: None,
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn AddressParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    #[must_use]
    pub fn with_gazetteer(mut self, gazetteer: Arc<dyn Gazetteer>) -> Self {
        self.gazetteer = Some(gazetteer);
        self
    }

    #[must_use]
    pub fn with_pip(mut self, pip: Arc<dyn PointInPolygon>) -> Self {
        self.pip = Some(pip);
        self
    }

    #[must_use]
    pub fn with_interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Arc<dyn LanguageService>) -> Self {
        self.language = Some(language);
        self
    }
}

#[cfg(feature = "http")]
mod http {
    use std::sync::Arc;

    use geocascade_services::{
        ServiceError,
        http::{
            ElasticsearchClient, HttpAddressParser, HttpGazetteer, HttpInterpolator,
            HttpLanguageService, HttpPointInPolygon,
        },
    };
    use tracing::info;

    use super::Services;
    use crate::{config::ApiConfig, error::Result};

    impl Services {
        /// HTTP clients for every service configured in `config`, sharing one connection pool.
        pub fn from_config(config: &ApiConfig) -> Result<Self> {
            let http = reqwest::Client::builder()
                .pool_idle_timeout(std::time::Duration::from_secs(90))
                .build()
                .map_err(|source| ServiceError::Http {
                    service: "http client",
                    source,
                })?;

            let backend = ElasticsearchClient::new(
                http.clone(),
                config.search_backend.clone(),
                &config.index_name,
            );
            let services = &config.services;
            let built = Self {
                backend: Arc::new(backend),
                parser: services.libpostal.clone().map(|endpoint| {
                    Arc::new(HttpAddressParser::new(http.clone(), endpoint)) as Arc<_>
                }),
                gazetteer: services.placeholder.clone().map(|endpoint| {
                    Arc::new(HttpGazetteer::new(http.clone(), endpoint)) as Arc<_>
                }),
                pip: services.pip.clone().map(|endpoint| {
                    Arc::new(HttpPointInPolygon::new(http.clone(), endpoint)) as Arc<_>
                }),
                interpolator: services.interpolation.clone().map(|endpoint| {
                    Arc::new(HttpInterpolator::new(http.clone(), endpoint)) as Arc<_>
                }),
                language: services.language_endpoint().cloned().map(|endpoint| {
                    Arc::new(HttpLanguageService::new(http.clone(), endpoint)) as Arc<_>
                }),
            };
            info!(services = ?built, "Built HTTP service clients");
            Ok(built)
        }
    }
}
