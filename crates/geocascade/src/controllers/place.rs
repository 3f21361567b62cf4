use std::sync::Arc;

use async_trait::async_trait;
use geocascade_services::{MgetKey, SearchBackend};
use tracing::{info, instrument};

use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

/// Lookup by the gids in `clean.ids`.
pub struct Place {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl Place {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }
}

#[async_trait]
impl StageEffect for Place {
    #[instrument(name = "Place", level = "debug", skip_all, fields(ids = ctx.clean.ids.len()))]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let ids = &ctx.clean.ids;
        let keys = ids
            .iter()
            .map(|gid| MgetKey::legacy(&self.index, &gid.layer, &gid.id))
            .chain(ids.iter().map(|gid| MgetKey::modern(&self.index, &gid.to_string())))
            .collect::<Vec<_>>();

        match self.backend.mget(&keys).await {
            Ok(docs) => {
                info!(result_count = docs.len(), "Place lookup complete");
                ctx.data = docs;
            }
            Err(e) => ctx.push_error(e.to_string()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geocascade_services::{Gid, MatchRecord, memory::MemorySearchBackend};

    use super::*;
    use crate::context::Clean;

    #[tokio::test]
    async fn test_place_lookup() {
        let backend = Arc::new(
            MemorySearchBackend::new().with_documents(vec![MatchRecord::new("osm", "venue", "1")]),
        );
        let ids = vec![
            Gid::new("osm", "venue", "1"),
            Gid::new("osm", "venue", "404"),
        ];
        let mut ctx = RequestContext::new(Clean::new(10).with_ids(ids));

        Place::new(backend.clone(), "pelias")
            .apply(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.data.len(), 1);
        assert_eq!(backend.mget_keys()[0].len(), 4);
    }
}
