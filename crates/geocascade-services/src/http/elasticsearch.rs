use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::{
    document::MatchRecord,
    endpoint::ServiceEndpoint,
    error::{Result, ServiceError},
    query::{MgetKey, QueryKind, SearchMeta, SearchQuery, SearchResponse},
    service::SearchBackend,
};

const SERVICE: &str = "elasticsearch";

/// Search index client speaking the Elasticsearch REST API.
#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: Client,
    endpoint: ServiceEndpoint,
    index: String,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Option<Map<String, Value>>,
    #[serde(default)]
    found: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    took: Option<u64>,
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct MgetBody {
    #[serde(default)]
    docs: Vec<Hit>,
}

impl ElasticsearchClient {
    pub fn new(http: Client, endpoint: ServiceEndpoint, index: impl Into<String>) -> Self {
        Self {
            http,
            endpoint,
            index: index.into(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .http
            .post(self.endpoint.join(path))
            .json(body)
            .timeout(self.endpoint.timeout())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse {
                service: SERVICE,
                message: e.to_string(),
            })
    }
}

/// Convert a raw hit into a record, using the document id as gid when the source lacks one.
fn hit_to_record(hit: Hit) -> Option<MatchRecord> {
    let mut source = hit.source?;
    source
        .entry("gid")
        .or_insert_with(|| Value::String(hit.id.clone()));
    match serde_json::from_value::<MatchRecord>(Value::Object(source)) {
        Ok(mut record) => {
            if let Some(score) = hit.score {
                record
                    .details
                    .insert("_score".to_string(), Value::from(score));
            }
            Some(record)
        }
        Err(e) => {
            warn!(id = %hit.id, error = %e, "Dropping undecodable document");
            None
        }
    }
}

fn terms_filter(field: &str, values: Option<&Vec<String>>) -> Option<Value> {
    values
        .filter(|v| !v.is_empty())
        .map(|v| json!({ "terms": { field: v } }))
}

/// Minimal rendering of a [`SearchQuery`]; ranking is left to the index defaults.
pub(crate) fn render(query: &SearchQuery) -> Value {
    let mut must = Vec::new();
    let mut filter = Vec::new();

    match query.kind {
        QueryKind::Reverse => {}
        QueryKind::Autocomplete => {
            if let Some(text) = &query.text {
                must.push(json!({ "match_phrase_prefix": { "name.default": text } }));
            }
        }
        QueryKind::AddressUsingIds => {
            if let Some(street) = query.parsed_text.get("street") {
                must.push(json!({ "match_phrase": { "address_parts.street": street } }));
            }
            if let Some(number) = query.parsed_text.get("number") {
                must.push(json!({ "term": { "address_parts.number": number } }));
            }
            let admin = query
                .admin_ids
                .iter()
                .map(|(layer, ids)| json!({ "terms": { format!("parent.{layer}_id"): ids } }))
                .collect::<Vec<_>>();
            if !admin.is_empty() {
                filter.push(json!({ "bool": { "should": admin, "minimum_should_match": 1 } }));
            }
        }
        QueryKind::Fallback | QueryKind::Structured => {
            for (field, value) in &query.parsed_text {
                let path = match field.as_str() {
                    "number" => "address_parts.number".to_string(),
                    "street" => "address_parts.street".to_string(),
                    "postalcode" => "address_parts.zip".to_string(),
                    "query" => "name.default".to_string(),
                    "city" => "parent.locality".to_string(),
                    "state" => "parent.region".to_string(),
                    other => format!("parent.{other}"),
                };
                must.push(json!({ "match": { path: value } }));
            }
            if must.is_empty() {
                if let Some(text) = &query.text {
                    must.push(json!({ "match": { "name.default": text } }));
                }
            }
        }
        QueryKind::Original => {
            if let Some(text) = &query.text {
                must.push(json!({ "match": { "phrase.default": text } }));
            }
        }
    }

    filter.extend(terms_filter("layer", query.layers.as_ref()));
    filter.extend(terms_filter("source", query.sources.as_ref()));
    filter.extend(terms_filter("category", query.categories.as_ref()));
    if let Some(country) = &query.boundary_country {
        filter.push(json!({ "match": { "parent.country_a": country } }));
    }
    if let Some(rect) = &query.boundary_rect {
        filter.push(json!({ "geo_bounding_box": { "center_point": {
            "top": rect.max_lat, "left": rect.min_lon,
            "bottom": rect.min_lat, "right": rect.max_lon,
        } } }));
    }

    let mut body = json!({
        "size": query.size,
        "query": { "bool": { "must": must, "filter": filter } },
    });

    if let Some(point) = query.point.filter(|_| query.kind == QueryKind::Reverse) {
        body["sort"] = json!([{ "_geo_distance": {
            "center_point": { "lat": point.lat, "lon": point.lon },
            "order": "asc",
            "unit": "km",
        } }]);
    }
    body
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    #[instrument(name = "Elasticsearch search", level = "debug", skip_all, fields(kind = %query.kind))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let body = render(query);
        debug!(body = %body, "Rendered query");
        let response: SearchBody = self.post(&format!("{}/_search", self.index), &body).await?;
        let total = response.hits.hits.len() as u64;
        Ok(SearchResponse {
            records: response
                .hits
                .hits
                .into_iter()
                .filter_map(hit_to_record)
                .collect(),
            meta: SearchMeta {
                took_ms: response.took,
                total: Some(total),
            },
        })
    }

    #[instrument(name = "Elasticsearch mget", level = "debug", skip_all, fields(keys = keys.len()))]
    async fn mget(&self, keys: &[MgetKey]) -> Result<Vec<MatchRecord>> {
        let body = json!({ "docs": keys });
        let response: MgetBody = self.post("_mget", &body).await?;
        Ok(response
            .docs
            .into_iter()
            .filter(|doc| doc.found.unwrap_or(true))
            .filter_map(hit_to_record)
            .collect())
    }
}
