//! Shared application state
//!
//! [`CocktailContext`] is built once per process and handed to the CLI
//! commands and the MCP tool handlers. The index sits behind a
//! `tokio::sync::RwLock`: searches share the read side, while build and load
//! take the write side and swap the index contents in one step.


use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::embedder_from_config;
use crate::index::{DistanceMetric, SimilarityIndex, snapshot};
use crate::recipes::{self, Record, SearchHit, SourceRecord};
use crate::{CocktailError, Result};

/// Where the index came from at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    /// Loaded from the saved snapshot
    Snapshot,
    /// Built from the dataset and saved
    Built,
    /// No usable index; only attribute filters work
    Unavailable,
}

/// Point-in-time description of the index, as reported by `status`
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub indexed_records: usize,
    pub catalog_records: usize,
    pub embedder: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub generation: Option<String>,
    pub snapshot_dir: String,
    pub snapshot_present: bool,
}

pub struct CocktailContext {
    config: Config,
    index: Arc<RwLock<SimilarityIndex>>,
    catalog: Arc<RwLock<Vec<Record>>>,
}

impl CocktailContext {
    #[inline]
    pub fn new(config: Config, index: SimilarityIndex) -> Self {
        Self {
            config,
            index: Arc::new(RwLock::new(index)),
            catalog: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Context with the embedder and metric named in `config`; the index
    /// starts empty
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = embedder_from_config(&config)?;
        let index = SimilarityIndex::new(embedder, config.index.metric);
        Ok(Self::new(config, index))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &Arc<RwLock<SimilarityIndex>> {
        &self.index
    }

    /// Bring the index up: load the snapshot, else build from the dataset
    /// and save, else stay empty and serve attribute filters only
    #[inline]
    pub async fn initialize(&self) -> Result<IndexSource> {
        let snapshot_dir = self.config.snapshot_path();
        match self.load_snapshot(&snapshot_dir).await {
            Ok(_) => return Ok(IndexSource::Snapshot),
            Err(CocktailError::IndexFileMissing(path)) => {
                info!("No snapshot at {}", path.display());
            }
            Err(e) => warn!("Ignoring unusable snapshot: {}", e),
        }

        let dataset_path = self.config.dataset_path();
        if !dataset_path.exists() {
            warn!(
                "Dataset {} not found; similarity search is unavailable",
                dataset_path.display()
            );
            return Ok(IndexSource::Unavailable);
        }

        let sources = match recipes::load_dataset(&dataset_path) {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Dataset unusable, similarity search is unavailable: {}", e);
                return Ok(IndexSource::Unavailable);
            }
        };
        *self.catalog.write().await = recipes::prepare_records(&sources);

        if let Err(e) = self.rebuild(&sources).await {
            warn!("Could not build index, serving filters only: {}", e);
            return Ok(IndexSource::Unavailable);
        }

        if let Err(e) = self.save().await {
            warn!("Index built but not saved: {}", e);
        }
        Ok(IndexSource::Built)
    }

    /// Replace the index with the snapshot in `dir`
    #[inline]
    pub async fn load_snapshot(&self, dir: &Path) -> Result<usize> {
        let mut index = self.index.write().await;
        let count = index.load(dir)?;
        *self.catalog.write().await = index.records().to_vec();
        Ok(count)
    }

    /// Build (or rebuild) the index from source records
    #[inline]
    pub async fn rebuild(&self, sources: &[SourceRecord]) -> Result<usize> {
        let mut index = self.index.write().await;
        let count = index.rebuild(sources)?;
        *self.catalog.write().await = index.records().to_vec();
        Ok(count)
    }

    /// Persist the index to the configured snapshot directory
    #[inline]
    pub async fn save(&self) -> Result<String> {
        let index = self.index.read().await;
        index.save(&self.config.snapshot_path())
    }

    /// Nearest recipes to free text; `k` defaults to the configured value
    #[inline]
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchHit>> {
        let k = k.unwrap_or(self.config.index.default_k);
        self.index.read().await.search(query, k)
    }

    /// Recipes similar to the named cocktail
    #[inline]
    pub async fn recommend_similar(&self, name: &str, k: Option<usize>) -> Result<Vec<SearchHit>> {
        self.search(&name.to_lowercase(), k).await
    }

    /// Recipes matching a set of preferred ingredients
    #[inline]
    pub async fn recommend_for_ingredients(
        &self,
        ingredients: &[String],
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        if ingredients.is_empty() {
            return Ok(Vec::new());
        }
        self.search(&ingredients.join(" "), k).await
    }

    #[inline]
    pub async fn by_ingredient(&self, ingredient: &str, limit: usize) -> Vec<Record> {
        let catalog = self.catalog.read().await;
        recipes::by_ingredient(&catalog, ingredient, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    #[inline]
    pub async fn by_alcoholic(
        &self,
        alcoholic: bool,
        ingredient: Option<&str>,
        limit: usize,
    ) -> Vec<Record> {
        let catalog = self.catalog.read().await;
        recipes::by_alcoholic(&catalog, alcoholic, ingredient, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    #[inline]
    pub async fn status(&self) -> IndexStatus {
        let index = self.index.read().await;
        let catalog_records = self.catalog.read().await.len();
        let snapshot_dir = self.config.snapshot_path();

        IndexStatus {
            ready: index.is_ready(),
            indexed_records: index.len(),
            catalog_records,
            embedder: index.embedder().name().to_string(),
            dimension: index.dimension(),
            metric: index.metric(),
            generation: index.generation().map(str::to_string),
            snapshot_present: snapshot::exists(&snapshot_dir),
            snapshot_dir: snapshot_dir.display().to_string(),
        }
    }
}
