//! Text embedding providers
//!
//! An [`Embedder`] maps text to fixed-dimension vectors. The index only ever
//! talks to this trait; the model behind it is an external dependency.

pub mod hashing;
pub mod ollama;


use std::sync::Arc;

use tracing::info;

use crate::config::{Config, EmbedderProvider};
use crate::{CocktailError, Result};

pub use hashing::HashingEmbedder;
pub use ollama::{ModelInfo, OllamaClient};

/// Dense embedding vector
pub type Vector = Vec<f32>;

/// Converts text into vectors of a fixed dimension
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    ///
    /// Implementations fail with [`CocktailError::EmbeddingUnavailable`] when
    /// the model cannot be reached; they never return placeholder vectors.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Embed a single text; same result as a one-element [`Embedder::embed`]
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vector> {
        self.embed(&[text.to_string()])?.pop().ok_or_else(|| {
            CocktailError::EmbeddingUnavailable("model returned no embedding".to_string())
        })
    }

    /// Dimension of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Short description for logs
    fn name(&self) -> &str;
}

/// Build the embedder selected in the configuration
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedder.provider {
        EmbedderProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbedderProvider::Hashing => {
            Arc::new(HashingEmbedder::new(config.embedder.dimension as usize))
        }
    };

    info!(
        "Using embedder {} ({} dimensions)",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}
