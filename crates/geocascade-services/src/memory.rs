//! In-memory service implementations.
//!
//! These back the example binary and the test suites. Each one answers from canned data,
//! records what it was asked, and can be switched into a failing mode to exercise the
//! error paths of the pipeline.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{
    document::{Centroid, MatchRecord},
    error::{Result, ServiceError},
    query::{MgetKey, QueryKind, SearchMeta, SearchQuery, SearchResponse},
    service::{
        AddressParser, Gazetteer, GazetteerPlace, InterpolatedPoint, Interpolator,
        LanguageService, ParsedComponent, PipArea, PointInPolygon, SearchBackend,
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Call log plus optional forced failure, shared by every fake.
#[derive(Debug)]
struct Recorder<C> {
    calls: Mutex<Vec<C>>,
    failure: Option<String>,
    service: &'static str,
}

impl<C: Clone> Recorder<C> {
    fn new(service: &'static str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
            service,
        }
    }

    fn record(&self, call: C) -> Result<()> {
        lock(&self.calls).push(call);
        match &self.failure {
            Some(message) => Err(ServiceError::Unavailable {
                service: self.service,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn calls(&self) -> Vec<C> {
        lock(&self.calls).clone()
    }
}

/// Search index fake. Search results are canned per [`QueryKind`]; `mget` resolves keys
/// against a document store the same way the real index would.
#[derive(Debug)]
pub struct MemorySearchBackend {
    results: HashMap<QueryKind, Vec<MatchRecord>>,
    documents: Vec<MatchRecord>,
    searches: Recorder<SearchQuery>,
    mgets: Recorder<Vec<MgetKey>>,
}

impl Default for MemorySearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySearchBackend {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            documents: Vec::new(),
            searches: Recorder::new("search"),
            mgets: Recorder::new("search"),
        }
    }

    #[must_use]
    pub fn with_results(mut self, kind: QueryKind, records: Vec<MatchRecord>) -> Self {
        self.results.insert(kind, records);
        self
    }

    #[must_use]
    pub fn with_documents(mut self, documents: Vec<MatchRecord>) -> Self {
        self.documents = documents;
        self
    }

    /// Make both `search` and `mget` fail with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.searches.failure = Some(message.clone());
        self.mgets.failure = Some(message);
        self
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.searches.calls()
    }

    pub fn search_count(&self) -> usize {
        self.searches.calls().len()
    }

    pub fn mget_keys(&self) -> Vec<Vec<MgetKey>> {
        self.mgets.calls()
    }

    fn resolve(&self, key: &MgetKey) -> Option<MatchRecord> {
        self.documents
            .iter()
            .find(|doc| match &key.doc_type {
                Some(layer) => doc.layer == *layer && doc.legacy_id() == key.id,
                None => doc.gid == key.id,
            })
            .cloned()
    }
}

#[async_trait]
impl SearchBackend for MemorySearchBackend {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        self.searches.record(query.clone())?;
        let records = self
            .results
            .get(&query.kind)
            .map(|records| records.iter().take(query.size).cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(SearchResponse {
            meta: SearchMeta {
                took_ms: Some(0),
                total: Some(records.len() as u64),
            },
            records,
        })
    }

    async fn mget(&self, keys: &[MgetKey]) -> Result<Vec<MatchRecord>> {
        self.mgets.record(keys.to_vec())?;
        let mut found: Vec<MatchRecord> = Vec::new();
        for doc in keys.iter().filter_map(|key| self.resolve(key)) {
            if !found.iter().any(|f| f.gid == doc.gid) {
                found.push(doc);
            }
        }
        Ok(found)
    }
}

/// Address parser fake keyed by exact input text.
#[derive(Debug)]
pub struct MemoryParser {
    responses: HashMap<String, Vec<ParsedComponent>>,
    recorder: Recorder<String>,
}

impl Default for MemoryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryParser {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            recorder: Recorder::new("libpostal"),
        }
    }

    #[must_use]
    pub fn with_response(mut self, text: &str, components: &[(&str, &str)]) -> Self {
        self.responses.insert(
            text.to_string(),
            components
                .iter()
                .map(|(label, value)| ParsedComponent::new(*label, *value))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.recorder.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.recorder.calls()
    }
}

#[async_trait]
impl AddressParser for MemoryParser {
    async fn parse(&self, text: &str) -> Result<Vec<ParsedComponent>> {
        self.recorder.record(text.to_string())?;
        Ok(self.responses.get(text).cloned().unwrap_or_default())
    }
}

/// Gazetteer fake returning the same places for every query.
#[derive(Debug)]
pub struct MemoryGazetteer {
    places: Vec<GazetteerPlace>,
    recorder: Recorder<(String, Option<String>)>,
}

impl Default for MemoryGazetteer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryGazetteer {
    pub fn new(places: Vec<GazetteerPlace>) -> Self {
        Self {
            places,
            recorder: Recorder::new("placeholder"),
        }
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.recorder.failure = Some(message.into());
        self
    }

    /// `(text, lang)` for each call.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.recorder.calls()
    }
}

#[async_trait]
impl Gazetteer for MemoryGazetteer {
    async fn search(&self, text: &str, lang: Option<&str>) -> Result<Vec<GazetteerPlace>> {
        self.recorder
            .record((text.to_string(), lang.map(str::to_string)))?;
        Ok(self.places.clone())
    }
}

/// Point-in-polygon fake returning a fixed hierarchy.
#[derive(Debug)]
pub struct MemoryPip {
    areas: BTreeMap<String, Vec<PipArea>>,
    recorder: Recorder<Centroid>,
}

impl Default for MemoryPip {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl MemoryPip {
    pub fn new(areas: BTreeMap<String, Vec<PipArea>>) -> Self {
        Self {
            areas,
            recorder: Recorder::new("pip"),
        }
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.recorder.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<Centroid> {
        self.recorder.calls()
    }
}

#[async_trait]
impl PointInPolygon for MemoryPip {
    async fn lookup(
        &self,
        point: Centroid,
        layers: Option<&[String]>,
    ) -> Result<BTreeMap<String, Vec<PipArea>>> {
        self.recorder.record(point)?;
        Ok(self
            .areas
            .iter()
            .filter(|(layer, _)| layers.is_none_or(|layers| layers.contains(layer)))
            .map(|(layer, areas)| (layer.clone(), areas.clone()))
            .collect())
    }
}

/// Interpolation fake answering every request with the same point.
#[derive(Debug)]
pub struct MemoryInterpolator {
    point: Option<InterpolatedPoint>,
    recorder: Recorder<(String, String)>,
}

impl Default for MemoryInterpolator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryInterpolator {
    pub fn new(point: Option<InterpolatedPoint>) -> Self {
        Self {
            point,
            recorder: Recorder::new("interpolation"),
        }
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.recorder.failure = Some(message.into());
        self
    }

    /// `(street, number)` for each call.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.recorder.calls()
    }
}

#[async_trait]
impl Interpolator for MemoryInterpolator {
    async fn interpolate(
        &self,
        street: &str,
        number: &str,
        _near: Centroid,
    ) -> Result<Option<InterpolatedPoint>> {
        self.recorder
            .record((street.to_string(), number.to_string()))?;
        Ok(self.point.clone())
    }
}

/// Language fake backed by an id to name table.
#[derive(Debug)]
pub struct MemoryLanguage {
    names: BTreeMap<String, String>,
    recorder: Recorder<(Vec<String>, String)>,
}

impl Default for MemoryLanguage {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl MemoryLanguage {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self {
            names,
            recorder: Recorder::new("language"),
        }
    }

    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.recorder.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.recorder.calls()
    }
}

#[async_trait]
impl LanguageService for MemoryLanguage {
    async fn translate(&self, ids: &[String], lang: &str) -> Result<BTreeMap<String, String>> {
        self.recorder.record((ids.to_vec(), lang.to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.names.get(id).map(|name| (id.clone(), name.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mget_resolves_modern_and_legacy_keys() {
        let mut legacy = MatchRecord::new("whosonfirst", "locality", "101");
        legacy.gid = "101".to_string();
        let backend = MemorySearchBackend::new().with_documents(vec![
            MatchRecord::new("osm", "venue", "1"),
            legacy,
        ]);

        let found = backend
            .mget(&[
                MgetKey::legacy("pelias", "locality", "101"),
                MgetKey::modern("pelias", "osm:venue:1"),
                MgetKey::modern("pelias", "osm:venue:404"),
            ])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].gid, "101");
        assert_eq!(backend.mget_keys()[0].len(), 3);
    }

    #[tokio::test]
    async fn test_failing_backend_still_records() {
        let backend = MemorySearchBackend::new().failing("down");
        let err = backend
            .search(&SearchQuery::new(QueryKind::Fallback, 10))
            .await
            .unwrap_err();
        assert_eq!(err.service(), Some("search"));
        assert_eq!(backend.search_count(), 1);
    }

    #[tokio::test]
    async fn test_search_respects_size() {
        let backend = MemorySearchBackend::new().with_results(
            QueryKind::Reverse,
            vec![
                MatchRecord::new("osm", "venue", "1"),
                MatchRecord::new("osm", "venue", "2"),
            ],
        );
        let response = backend
            .search(&SearchQuery::new(QueryKind::Reverse, 1))
            .await
            .unwrap();
        assert_eq!(response.records.len(), 1);
        assert_eq!(response.meta.total, Some(1));
    }

    #[tokio::test]
    async fn test_pip_filters_layers() {
        let area = PipArea {
            id: 1,
            name: "Somewhere".to_string(),
            abbr: None,
            centroid: None,
            bounding_box: None,
        };
        let pip = MemoryPip::new(BTreeMap::from([
            ("locality".to_string(), vec![area.clone()]),
            ("country".to_string(), vec![area]),
        ]));
        let layers = vec!["country".to_string()];
        let found = pip
            .lookup(Centroid::new(0.0, 0.0), Some(&layers))
            .await
            .unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["country"]);
    }
}
