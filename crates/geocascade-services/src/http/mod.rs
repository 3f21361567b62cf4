//! reqwest-backed clients for the auxiliary microservices and the search index.

mod elasticsearch;

use std::collections::BTreeMap;

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

pub use elasticsearch::ElasticsearchClient;

use crate::{
    document::Centroid,
    endpoint::ServiceEndpoint,
    error::{Result, ServiceError},
    service::{
        AddressParser, Gazetteer, GazetteerPlace, InterpolatedPoint, Interpolator,
        LanguageService, ParsedComponent, PipArea, PointInPolygon,
    },
};

/// Shared plumbing for JSON-over-GET services.
#[derive(Debug, Clone)]
pub struct MicroserviceClient {
    name: &'static str,
    http: Client,
    endpoint: ServiceEndpoint,
}

impl MicroserviceClient {
    pub fn new(name: &'static str, http: Client, endpoint: ServiceEndpoint) -> Self {
        Self {
            name,
            http,
            endpoint,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[instrument(name = "Microservice GET", level = "debug", skip(self, query), fields(service = self.name))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint.join(path);
        debug!(url, "Calling service");
        let response = self
            .http
            .get(&url)
            .query(query)
            .timeout(self.endpoint.timeout())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ServiceError::from_reqwest(self.name, e))?;

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse {
                service: self.name,
                message: e.to_string(),
            })
    }
}

/// Address parser over HTTP (`GET /parse?address=`).
#[derive(Debug, Clone)]
pub struct HttpAddressParser(MicroserviceClient);

impl HttpAddressParser {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self(MicroserviceClient::new("libpostal", http, endpoint))
    }
}

#[async_trait]
impl AddressParser for HttpAddressParser {
    async fn parse(&self, text: &str) -> Result<Vec<ParsedComponent>> {
        self.0
            .get_json("parse", &[("address", text.to_string())])
            .await
    }
}

/// Gazetteer over HTTP (`GET /parser/search?text=&lang=`).
#[derive(Debug, Clone)]
pub struct HttpGazetteer(MicroserviceClient);

impl HttpGazetteer {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self(MicroserviceClient::new("placeholder", http, endpoint))
    }
}

#[async_trait]
impl Gazetteer for HttpGazetteer {
    async fn search(&self, text: &str, lang: Option<&str>) -> Result<Vec<GazetteerPlace>> {
        let mut query = vec![("text", text.to_string())];
        if let Some(lang) = lang {
            query.push(("lang", lang.to_string()));
        }
        self.0.get_json("parser/search", &query).await
    }
}

/// Point-in-polygon over HTTP (`GET /{lon}/{lat}?layers=`).
#[derive(Debug, Clone)]
pub struct HttpPointInPolygon(MicroserviceClient);

impl HttpPointInPolygon {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self(MicroserviceClient::new("pip", http, endpoint))
    }
}

#[async_trait]
impl PointInPolygon for HttpPointInPolygon {
    async fn lookup(
        &self,
        point: Centroid,
        layers: Option<&[String]>,
    ) -> Result<BTreeMap<String, Vec<PipArea>>> {
        let path = format!("{}/{}", point.lon, point.lat);
        let query = layers
            .map(|layers| vec![("layers", layers.iter().join(","))])
            .unwrap_or_default();
        self.0.get_json(&path, &query).await
    }
}

#[derive(Debug, Deserialize)]
struct InterpolationFeature {
    properties: Option<InterpolatedPoint>,
}

/// Interpolation over HTTP (`GET /search/geojson?number=&street=&lat=&lon=`).
#[derive(Debug, Clone)]
pub struct HttpInterpolator(MicroserviceClient);

impl HttpInterpolator {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self(MicroserviceClient::new("interpolation", http, endpoint))
    }
}

#[async_trait]
impl Interpolator for HttpInterpolator {
    async fn interpolate(
        &self,
        street: &str,
        number: &str,
        near: Centroid,
    ) -> Result<Option<InterpolatedPoint>> {
        let feature: Option<InterpolationFeature> = self
            .0
            .get_json(
                "search/geojson",
                &[
                    ("number", number.to_string()),
                    ("street", street.to_string()),
                    ("lat", near.lat.to_string()),
                    ("lon", near.lon.to_string()),
                ],
            )
            .await?;
        Ok(feature.and_then(|f| f.properties))
    }
}

#[derive(Debug, Deserialize)]
struct FindByIdEntry {
    name: String,
}

/// Language lookup over the gazetteer's `GET /parser/findbyid?ids=&lang=` endpoint.
#[derive(Debug, Clone)]
pub struct HttpLanguageService(MicroserviceClient);

impl HttpLanguageService {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self(MicroserviceClient::new("language", http, endpoint))
    }
}

#[async_trait]
impl LanguageService for HttpLanguageService {
    async fn translate(&self, ids: &[String], lang: &str) -> Result<BTreeMap<String, String>> {
        let entries: BTreeMap<String, FindByIdEntry> = self
            .0
            .get_json(
                "parser/findbyid",
                &[("ids", ids.iter().join(",")), ("lang", lang.to_string())],
            )
            .await?;
        Ok(entries
            .into_iter()
            .map(|(id, entry)| (id, entry.name))
            .collect())
    }
}
