//! API configuration.
//!
//! A service is enabled iff it has an endpoint configured; routes derive their service
//! guards from this struct at build time, so there is no process-wide state.

use std::path::Path;

use geocascade_services::ServiceEndpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use error::ConfigError;
use error::Result;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Failed to read config file: {0}")]
        Io(#[from] std::io::Error),
        #[error("Failed to parse config: {0}")]
        Parse(#[from] serde_json::Error),
        #[error("Invalid configuration: {0}")]
        Invalid(String),
    }
    pub type Result<T> = std::result::Result<T, ConfigError>;
}

/// Endpoints for the auxiliary microservices. `None` disables the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub placeholder: Option<ServiceEndpoint>,
    pub pip: Option<ServiceEndpoint>,
    pub interpolation: Option<ServiceEndpoint>,
    pub libpostal: Option<ServiceEndpoint>,
    /// Falls back to the placeholder endpoint, which serves the same lookups.
    pub language: Option<ServiceEndpoint>,
}

impl ServicesConfig {
    pub fn language_endpoint(&self) -> Option<&ServiceEndpoint> {
        self.language.as_ref().or(self.placeholder.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    pub index_name: String,
    pub version: String,
    pub attribution: String,
    pub default_size: usize,
    pub max_size: usize,
    /// ISO3 country codes where the house number follows the street name.
    pub flip_number_and_street_countries: Vec<String>,
    pub search_backend: ServiceEndpoint,
    pub services: ServicesConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            index_name: "pelias".to_string(),
            version: "1.0".to_string(),
            attribution: "http://localhost:3100/attribution".to_string(),
            default_size: 10,
            max_size: 40,
            flip_number_and_street_countries: ["DEU", "FIN", "SWE", "NOR", "DNK", "ISL", "CZE"]
                .into_iter()
                .map(String::from)
                .collect(),
            search_backend: ServiceEndpoint::new("http://localhost:9200").with_timeout_ms(2500),
            services: ServicesConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Parse a JSON config. Both a bare object and one nested under `"api"` are accepted.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(json)?;
        if let Some(api) = value.get_mut("api").map(Value::take) {
            value = api;
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading API config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Result count for a request: `default_size` when unset, otherwise clamped to
    /// `1..=max_size`.
    pub fn result_size(&self, requested: Option<usize>) -> usize {
        requested.map_or(self.default_size, |size| size.min(self.max_size).max(1))
    }

    pub fn is_placeholder_enabled(&self) -> bool {
        self.services.placeholder.is_some()
    }

    pub fn is_pip_enabled(&self) -> bool {
        self.services.pip.is_some()
    }

    pub fn is_interpolation_enabled(&self) -> bool {
        self.services.interpolation.is_some()
    }

    pub fn is_libpostal_enabled(&self) -> bool {
        self.services.libpostal.is_some()
    }

    pub fn is_language_enabled(&self) -> bool {
        self.services.language_endpoint().is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid("indexName must not be empty".into()));
        }
        if self.default_size == 0 || self.default_size > self.max_size {
            return Err(ConfigError::Invalid(format!(
                "defaultSize must be between 1 and maxSize ({}), got {}",
                self.max_size, self.default_size
            )));
        }
        let endpoints = [
            Some(&self.search_backend),
            self.services.placeholder.as_ref(),
            self.services.pip.as_ref(),
            self.services.interpolation.as_ref(),
            self.services.libpostal.as_ref(),
            self.services.language.as_ref(),
        ];
        for endpoint in endpoints.into_iter().flatten() {
            if !endpoint.url.starts_with("http://") && !endpoint.url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "service url must be http(s), got '{}'",
                    endpoint.url
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`ApiConfig`].
#[derive(Debug, Clone, Default)]
pub struct ApiConfigBuilder {
    config: ApiConfig,
}

impl ApiConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every microservice enabled on its conventional localhost port.
    pub fn local_services() -> Self {
        Self::new()
            .placeholder(ServiceEndpoint::new("http://localhost:4100"))
            .pip(ServiceEndpoint::new("http://localhost:4200"))
            .interpolation(ServiceEndpoint::new("http://localhost:4300"))
            .libpostal(ServiceEndpoint::new("http://localhost:4400"))
    }

    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.config.index_name = index_name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn attribution(mut self, attribution: impl Into<String>) -> Self {
        self.config.attribution = attribution.into();
        self
    }

    pub fn default_size(mut self, size: usize) -> Self {
        self.config.default_size = size;
        self
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    pub fn flip_number_and_street_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.flip_number_and_street_countries =
            countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn search_backend(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.search_backend = endpoint;
        self
    }

    pub fn placeholder(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.services.placeholder = Some(endpoint);
        self
    }

    pub fn pip(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.services.pip = Some(endpoint);
        self
    }

    pub fn interpolation(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.services.interpolation = Some(endpoint);
        self
    }

    pub fn libpostal(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.services.libpostal = Some(endpoint);
        self
    }

    pub fn language(mut self, endpoint: ServiceEndpoint) -> Self {
        self.config.services.language = Some(endpoint);
        self
    }

    pub fn build(self) -> Result<ApiConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
