use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use geocascade_services::{QueryKind, SearchBackend, SearchQuery};
use tracing::{info, instrument};

use crate::{
    context::{Clean, RequestContext},
    pipeline::{StageEffect, StageError},
};

/// Translate the sanitized request into a backend query of the given kind.
pub(crate) fn build_query(clean: &Clean, kind: QueryKind) -> SearchQuery {
    let mut query = SearchQuery::new(kind, clean.size);
    query.text.clone_from(&clean.text);
    if let Some(parsed) = &clean.parsed_text {
        query.parsed_text = parsed.as_map().clone();
    }
    query.layers.clone_from(&clean.layers);
    query.sources.clone_from(&clean.sources);
    query.categories.clone_from(&clean.categories);
    query.focus_point = clean.focus_point;
    query.point = clean.point;
    query.boundary_country.clone_from(&clean.boundary_country);
    query.boundary_rect = clean.boundary_rect;
    query
}

/// One backend query. Non-empty results replace `data`; an empty result leaves it alone
/// so a later fallback can still run.
pub struct Search {
    backend: Arc<dyn SearchBackend>,
    kind: QueryKind,
}

impl Search {
    pub fn new(backend: Arc<dyn SearchBackend>, kind: QueryKind) -> Self {
        Self { backend, kind }
    }
}

#[async_trait]
impl StageEffect for Search {
    #[instrument(name = "Search", level = "debug", skip_all, fields(kind = %self.kind))]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let t = Instant::now();
        let query = build_query(&ctx.clean, self.kind);

        let response = match self.backend.search(&query).await {
            Ok(response) => response,
            Err(e) => {
                ctx.push_error(e.to_string());
                return Ok(());
            }
        };

        info!(
            query_type = %self.kind,
            result_count = response.records.len(),
            took_ms = ?response.meta.took_ms,
            elapsed_ms = ?t.elapsed(),
            "Search complete"
        );
        if !response.records.is_empty() {
            ctx.data = response.records;
            ctx.meta.set_query_type(self.kind.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::{MatchRecord, memory::MemorySearchBackend};

    use super::*;

    #[tokio::test]
    async fn test_results_replace_data() {
        let backend = Arc::new(
            MemorySearchBackend::new()
                .with_results(QueryKind::Fallback, vec![MatchRecord::new("osm", "venue", "2")]),
        );
        let mut ctx = RequestContext::new(Clean::new(10).with_text("cafe"));
        ctx.data.push(MatchRecord::new("whosonfirst", "locality", "1"));

        Search::new(backend.clone(), QueryKind::Fallback)
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.data.len(), 1);
        assert_eq!(ctx.data[0].gid, "osm:venue:2");
        assert_eq!(ctx.meta.query_type(), Some("fallback"));
        assert_eq!(backend.queries()[0].text.as_deref(), Some("cafe"));
    }

    #[tokio::test]
    async fn test_empty_results_leave_data() {
        let backend = Arc::new(MemorySearchBackend::new());
        let mut ctx = RequestContext::new(Clean::new(10).with_text("cafe"));
        ctx.data.push(MatchRecord::new("whosonfirst", "locality", "1"));

        Search::new(backend, QueryKind::Original)
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.data.len(), 1);
        assert_eq!(ctx.meta.query_type(), None);
    }

    #[tokio::test]
    async fn test_backend_error_is_recorded() {
        let backend = Arc::new(MemorySearchBackend::new().failing("connection refused"));
        let mut ctx = RequestContext::new(Clean::new(10));

        Search::new(backend, QueryKind::Reverse)
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("connection refused"));
    }
}
