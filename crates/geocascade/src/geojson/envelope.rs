use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{FeatureCollection, geojsonify};
use crate::{config::ApiConfig, context::RequestContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Engine {
    pub name: String,
    pub author: String,
    pub version: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            author: "geocascade".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The `geocoding` block describing how the response was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geocoding {
    pub version: String,
    pub attribution: String,
    /// The sanitized request parameters.
    pub query: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResponse {
    pub geocoding: Geocoding,
    #[serde(flatten)]
    pub collection: FeatureCollection,
}

impl GeocodeResponse {
    pub fn is_error(&self) -> bool {
        self.geocoding.errors.is_some()
    }
}

/// Terminal step of a route: turns the finished context into a response.
pub trait Responder: Send + Sync {
    fn respond(&self, ctx: &mut RequestContext) -> GeocodeResponse;
}

/// GeocodeJSON output.
#[derive(Debug, Clone)]
pub struct GeocodeJson {
    version: String,
    attribution: String,
}

impl GeocodeJson {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            version: config.version.clone(),
            attribution: config.attribution.clone(),
        }
    }
}

impl Responder for GeocodeJson {
    fn respond(&self, ctx: &mut RequestContext) -> GeocodeResponse {
        let query = serde_json::to_value(&ctx.clean).unwrap_or_else(|e| {
            warn!(error = %e, "Could not serialize the sanitized query");
            Value::Null
        });

        let collection = if ctx.has_errors() {
            FeatureCollection::empty()
        } else {
            geojsonify(&ctx.clean, &ctx.data, &mut ctx.warnings)
        };

        let errors = ctx.has_errors().then(|| ctx.errors.clone());
        let warnings = (!ctx.warnings.is_empty()).then(|| ctx.warnings.clone());
        info!(
            features = collection.features.len(),
            errors = ctx.errors.len(),
            warnings = ctx.warnings.len(),
            query_type = ctx.meta.query_type().unwrap_or_default(),
            "Response assembled"
        );

        GeocodeResponse {
            geocoding: Geocoding {
                version: self.version.clone(),
                attribution: self.attribution.clone(),
                query,
                engine: errors.is_none().then(Engine::default),
                errors,
                warnings,
                timestamp: Utc::now().timestamp_millis(),
            },
            collection,
        }
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::MatchRecord;
    use serde_json::json;

    use super::*;
    use crate::context::Clean;

    #[test]
    fn test_error_shaped_response() {
        let mut ctx = RequestContext::sanitized(
            Clean::new(10).with_text("x"),
            vec!["invalid param 'size'".to_string()],
            vec!["ignoring 'foo'".to_string()],
        );
        ctx.data = vec![MatchRecord::new("osm", "venue", "1").with_centroid(0.0, 0.0)];

        let response = GeocodeJson::new(&ApiConfig::default()).respond(&mut ctx);

        assert!(response.is_error());
        assert!(response.collection.features.is_empty());
        assert!(response.geocoding.engine.is_none());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["geocoding"]["errors"], json!(["invalid param 'size'"]));
        assert_eq!(json["geocoding"]["warnings"], json!(["ignoring 'foo'"]));
        assert!(json.get("bbox").is_none());
    }

    #[test]
    fn test_success_response_shape() {
        let mut ctx = RequestContext::new(Clean::new(10).with_text("cafe").with_geometries("blob"));
        ctx.data = vec![MatchRecord::new("osm", "venue", "1")
            .with_name("Cafe")
            .with_centroid(1.0, 2.0)];

        let response = GeocodeJson::new(&ApiConfig::default()).respond(&mut ctx);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], json!("FeatureCollection"));
        assert_eq!(json["bbox"], json!([2.0, 1.0, 2.0, 1.0]));
        assert_eq!(json["geocoding"]["query"]["text"], json!("cafe"));
        assert_eq!(
            json["geocoding"]["warnings"],
            json!(["blob is not a valid geometry type"])
        );
        assert!(json["geocoding"]["engine"].is_object());
        assert!(json["geocoding"]["timestamp"].as_i64().unwrap() > 0);
    }
}
