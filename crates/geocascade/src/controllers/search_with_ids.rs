use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use geocascade_services::{QueryKind, SearchBackend};
use tracing::{debug, info, instrument};

use super::search::build_query;
use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

/// Street search constrained to the administrative areas already in `data`.
pub struct SearchWithIds {
    backend: Arc<dyn SearchBackend>,
}

impl SearchWithIds {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StageEffect for SearchWithIds {
    #[instrument(name = "Search with ids", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let mut query = build_query(&ctx.clean, QueryKind::AddressUsingIds);
        let mut admin_ids: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in ctx.data.iter().filter(|r| r.is_admin()) {
            admin_ids
                .entry(record.layer.clone())
                .or_default()
                .push(record.id());
        }
        if admin_ids.is_empty() {
            debug!("No admin ids in data, skipping");
            return Ok(());
        }
        debug!(admin_ids = ?admin_ids, "Resolved admin ids");
        query.admin_ids = admin_ids;

        match self.backend.search(&query).await {
            Ok(response) => {
                info!(
                    result_count = response.records.len(),
                    "Search with ids complete"
                );
                if !response.records.is_empty() {
                    ctx.data = response.records;
                    ctx.meta.set_query_type(QueryKind::AddressUsingIds.as_str());
                }
            }
            Err(e) => ctx.push_error(e.to_string()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::{MatchRecord, memory::MemorySearchBackend};

    use super::*;
    use crate::context::{Clean, ParsedText};

    #[tokio::test]
    async fn test_admin_ids_come_from_data() {
        let backend = Arc::new(MemorySearchBackend::new().with_results(
            QueryKind::AddressUsingIds,
            vec![MatchRecord::new("openaddresses", "address", "9")],
        ));
        let parsed: ParsedText = [("street", "Main St"), ("number", "10")].into_iter().collect();
        let mut ctx = RequestContext::new(Clean::new(10).with_parsed_text(parsed));
        ctx.data = vec![
            MatchRecord::new("whosonfirst", "locality", "101"),
            MatchRecord::new("whosonfirst", "region", "202"),
        ];

        SearchWithIds::new(backend.clone())
            .apply(&mut ctx)
            .await
            .unwrap();

        let query = &backend.queries()[0];
        assert_eq!(query.admin_ids["locality"], vec!["101".to_string()]);
        assert_eq!(query.admin_ids["region"], vec!["202".to_string()]);
        assert_eq!(query.parsed_text["street"], "Main St");
        assert_eq!(ctx.data[0].gid, "openaddresses:address:9");
    }

    #[tokio::test]
    async fn test_no_admin_records_no_query() {
        let backend = Arc::new(MemorySearchBackend::new());
        let mut ctx = RequestContext::new(Clean::new(10));

        SearchWithIds::new(backend.clone())
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(backend.search_count(), 0);
    }
}
