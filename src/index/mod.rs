//! Exact nearest-neighbor index over recipe embeddings
//!
//! The index owns one vector per record, joined by insertion position. It is
//! either empty or ready; every transition replaces the whole state, so a
//! failed build or load never leaves a half-populated index behind.

pub mod metric;
pub mod snapshot;
pub mod store;


use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::embeddings::Embedder;
use crate::recipes::{self, Record, SearchHit, SourceRecord};
use crate::{CocktailError, Result};

pub use metric::DistanceMetric;
pub use snapshot::Snapshot;
pub use store::VectorStore;

#[derive(Debug, Clone)]
struct IndexState {
    vectors: VectorStore,
    records: Vec<Record>,
    generation: Option<String>,
}

/// Similarity index backed by an [`Embedder`]
pub struct SimilarityIndex {
    embedder: Arc<dyn Embedder>,
    metric: DistanceMetric,
    state: Option<IndexState>,
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("embedder", &self.embedder.name())
            .field("metric", &self.metric)
            .field("len", &self.len())
            .finish()
    }
}

impl SimilarityIndex {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Self {
        Self {
            embedder,
            metric,
            state: None,
        }
    }

    /// Index `sources`, replacing whatever the index held before
    ///
    /// Records that cannot be described are skipped with a warning. Returns
    /// the number of records indexed.
    #[inline]
    pub fn build(&mut self, sources: &[SourceRecord]) -> Result<usize> {
        let records = recipes::prepare_records(sources);
        if records.is_empty() {
            return Err(CocktailError::NoEligibleRecords);
        }

        let skipped = sources.len() - records.len();
        info!(
            "Building index from {} records ({} skipped) with {}",
            records.len(),
            skipped,
            self.embedder.name()
        );

        let descriptions: Vec<String> = records.iter().map(|r| r.description.clone()).collect();
        let embeddings = self.embedder.embed(&descriptions)?;
        if embeddings.len() != records.len() {
            return Err(CocktailError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                records.len(),
                embeddings.len()
            )));
        }

        let mut vectors = VectorStore::with_capacity(self.embedder.dimension(), records.len());
        for embedding in &embeddings {
            vectors.push(embedding)?;
        }

        let count = records.len();
        self.state = Some(IndexState {
            vectors,
            records,
            generation: None,
        });

        info!("Index ready with {} vectors", count);
        Ok(count)
    }

    /// Same as [`SimilarityIndex::build`]; on failure the previous contents
    /// are kept
    #[inline]
    pub fn rebuild(&mut self, sources: &[SourceRecord]) -> Result<usize> {
        debug!("Rebuilding index ({} records currently)", self.len());
        self.build(sources)
    }

    /// The `k` records closest to `query`, nearest first
    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.state.is_none() {
            return Err(CocktailError::IndexNotReady);
        }
        if k == 0 {
            return Err(CocktailError::InvalidK);
        }

        debug!("Searching for '{}' (k = {})", query, k);
        let query_vector = self.embedder.embed_one(query)?;
        self.search_vector(&query_vector, k)
    }

    /// The `k` records closest to an already embedded query
    #[inline]
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.as_ref().ok_or(CocktailError::IndexNotReady)?;
        if k == 0 {
            return Err(CocktailError::InvalidK);
        }
        if query.len() != state.vectors.dimension() {
            return Err(CocktailError::DimensionMismatch {
                expected: state.vectors.dimension(),
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (self.metric.distance(query, vector), position))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);

        let hits = scored
            .into_iter()
            .map(|(distance, position)| SearchHit {
                record: state.records[position].clone(),
                similarity_score: distance,
            })
            .collect::<Vec<_>>();

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    /// Persist the index under `dir`
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<String> {
        let state = self.state.as_ref().ok_or(CocktailError::IndexNotReady)?;
        snapshot::write(dir, self.metric, &state.vectors, &state.records)
    }

    /// Replace the index contents with the snapshot stored under `dir`
    ///
    /// On any error the current contents are kept.
    #[inline]
    pub fn load(&mut self, dir: &Path) -> Result<usize> {
        let snapshot = snapshot::read(dir)?;

        if snapshot.metric != self.metric {
            return Err(CocktailError::CorruptIndex(format!(
                "snapshot uses the {} metric but the index is configured for {}",
                snapshot.metric, self.metric
            )));
        }
        if snapshot.vectors.dimension() != self.embedder.dimension() {
            return Err(CocktailError::CorruptIndex(format!(
                "snapshot has {}-dimensional vectors but {} produces {}",
                snapshot.vectors.dimension(),
                self.embedder.name(),
                self.embedder.dimension()
            )));
        }
        if snapshot.records.is_empty() {
            return Err(CocktailError::CorruptIndex(
                "snapshot contains no records".to_string(),
            ));
        }

        let count = snapshot.records.len();
        info!(
            "Loaded snapshot {} with {} vectors from {}",
            snapshot.generation,
            count,
            dir.display()
        );

        self.state = Some(IndexState {
            vectors: snapshot.vectors,
            records: snapshot.records,
            generation: Some(snapshot.generation),
        });
        Ok(count)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.records.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed records in insertion order; empty until built or loaded
    #[inline]
    pub fn records(&self) -> &[Record] {
        self.state
            .as_ref()
            .map_or(&[][..], |state| state.records.as_slice())
    }

    /// Generation of the snapshot this index was loaded from, if any
    #[inline]
    pub fn generation(&self) -> Option<&str> {
        self.state.as_ref()?.generation.as_deref()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

fn rank(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}
