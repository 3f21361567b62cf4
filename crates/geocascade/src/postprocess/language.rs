use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use geocascade_services::{ADMIN_LAYERS, Gid, LanguageService, MatchRecord};
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    context::RequestContext,
    pipeline::{StageEffect, StageError},
};

/// Admin ids referenced by a record's `<layer>_gid` details, per layer.
fn parent_ids(record: &MatchRecord) -> Vec<(&'static str, String)> {
    ADMIN_LAYERS
        .iter()
        .filter_map(|layer| {
            let gid = record
                .details
                .get(&format!("{layer}_gid"))
                .and_then(geocascade_services::field::string_value)?;
            let gid = gid.parse::<Gid>().ok()?;
            Some((*layer, gid.id))
        })
        .collect()
}

fn apply_translations(record: &mut MatchRecord, names: &BTreeMap<String, String>) {
    for (layer, id) in parent_ids(record) {
        if let Some(name) = names.get(&id) {
            record
                .details
                .insert(layer.to_string(), Value::from(vec![name.clone()]));
        }
    }
    if record.source == "whosonfirst" {
        if let Some(name) = names.get(&record.id()) {
            record
                .name
                .insert("default".to_string(), Value::String(name.clone()));
        }
    }
}

/// Swap administrative names for their translation in the requested language.
///
/// All ids go out in one call. A failed call leaves the names untouched.
pub struct ChangeLanguage {
    service: Arc<dyn LanguageService>,
}

impl ChangeLanguage {
    pub fn new(service: Arc<dyn LanguageService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageEffect for ChangeLanguage {
    #[instrument(name = "Change language", level = "debug", skip_all)]
    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), StageError> {
        let Some(lang) = ctx.clean.lang.clone() else {
            return Ok(());
        };
        let ids = ctx
            .data
            .iter()
            .flat_map(|record| {
                let own = (record.source == "whosonfirst").then(|| record.id());
                parent_ids(record)
                    .into_iter()
                    .map(|(_, id)| id)
                    .chain(own)
            })
            .unique()
            .collect::<Vec<_>>();
        if ids.is_empty() {
            debug!("No ids to translate");
            return Ok(());
        }

        let names = match self.service.translate(&ids, &lang).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, lang = %lang, "Language lookup failed");
                return Ok(());
            }
        };
        info!(lang = %lang, requested = ids.len(), translated = names.len(), "Translated names");
        for record in &mut ctx.data {
            apply_translations(record, &names);
        }
        Ok(())
    }
}
