use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use geocascade_services::SearchBackend;
use tracing::{info, instrument};

use super::geometry_join_keys;
use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

/// Joins the current results to their full index documents, which carry polygon geometry.
///
/// Both key shapes are sent in one multi-get because the index may hold documents keyed
/// by gid or, for older imports, by source id with the layer as document type.
pub struct PlaceholderGeometries {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl PlaceholderGeometries {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }
}

#[async_trait]
impl StageEffect for PlaceholderGeometries {
    #[instrument(name = "Placeholder geometries", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let t = Instant::now();
        let keys = geometry_join_keys(&self.index, &ctx.data);

        match self.backend.mget(&keys).await {
            Ok(docs) => {
                ctx.data = docs;
                ctx.meta.set_query_type("search_fallback");
                info!(
                    result_count = ctx.data.len(),
                    keys = keys.len(),
                    elapsed_ms = ?t.elapsed(),
                    "[controller:placeholder_geometries]"
                );
            }
            Err(e) => ctx.push_error(e.to_string()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::{MatchRecord, MgetKey, memory::MemorySearchBackend};
    use serde_json::json;

    use super::*;
    use crate::context::Clean;

    #[tokio::test]
    async fn test_issues_one_mget_with_both_key_shapes() {
        let full = MatchRecord::new("osm", "venue", "1")
            .with_polygon(json!({"type": "Polygon", "coordinates": []}));
        let backend = Arc::new(MemorySearchBackend::new().with_documents(vec![full]));

        let mut record = MatchRecord::new("osm", "venue", "1");
        record.source_id = Some("99".to_string());
        let mut ctx = RequestContext::new(Clean::new(10).with_geometries("polygon"));
        ctx.data.push(record);

        PlaceholderGeometries::new(backend.clone(), "pelias")
            .apply(&mut ctx)
            .await
            .unwrap();

        let calls = backend.mget_keys();
        assert_eq!(calls.len(), 1, "exactly one batched call");
        assert_eq!(
            calls[0],
            vec![
                MgetKey::legacy("pelias", "venue", "99"),
                MgetKey::modern("pelias", "osm:venue:1"),
            ]
        );
        assert!(ctx.data[0].has_polygon());
        assert_eq!(ctx.meta.query_type(), Some("search_fallback"));
    }

    #[tokio::test]
    async fn test_failure_keeps_data() {
        let backend = Arc::new(MemorySearchBackend::new().failing("mget failed"));
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.data.push(MatchRecord::new("osm", "venue", "1"));

        PlaceholderGeometries::new(backend, "pelias")
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.data.len(), 1);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("mget failed"));
    }
}
