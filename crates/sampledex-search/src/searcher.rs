use sampledex_core::model::SampleRecord;
use sampledex_core::schema::SampleStore;
use sampledex_etl::Embedder;
use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::filter::{similarity_percent, SearchFilters};

/// Nearest-neighbour candidates fetched per requested result, so that
/// filtering still leaves enough hits.
const FETCH_MULTIPLIER: usize = 3;
/// Upper bound on candidates fetched for one query.
const MAX_FETCH: usize = 100;

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: SampleRecord,
    /// Squared L2 distance between the query and sample embeddings.
    pub distance: f32,
    /// `0..=100`, higher is closer.
    pub similarity: f64,
}

/// Text-to-audio search over one sample store.
pub struct Searcher<'a> {
    store: &'a SampleStore,
    embedder: &'a dyn Embedder,
}

impl fmt::Debug for Searcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("store", &self.store.dir())
            .field("model", &self.embedder.model())
            .finish()
    }
}

/// Candidates to fetch from the store for `top_k` results.
pub fn fetch_count(top_k: usize) -> usize {
    top_k.saturating_mul(FETCH_MULTIPLIER).min(MAX_FETCH)
}

impl<'a> Searcher<'a> {
    pub fn new(store: &'a SampleStore, embedder: &'a dyn Embedder) -> Self {
        Self { store, embedder }
    }

    /// Find the samples that best match `query`, most similar first.
    ///
    /// A blank query returns no hits without contacting the embedder.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_text(query).await?;
        let neighbors = self.store.query(&embedding, fetch_count(top_k))?;
        let candidates = neighbors.len();

        let compiled = filters.compile();
        let hits: Vec<SearchHit> = neighbors
            .into_iter()
            .map(|neighbor| SearchHit {
                similarity: similarity_percent(neighbor.distance),
                distance: neighbor.distance,
                record: neighbor.record,
            })
            .filter(|hit| compiled.matches(&hit.record, hit.similarity))
            .take(top_k)
            .collect();

        log::debug!(
            "Query {:?}: {} candidates, {} hits after filtering",
            query,
            candidates,
            hits.len()
        );
        Ok(hits)
    }
}
