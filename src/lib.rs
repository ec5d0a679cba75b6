use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CocktailError>;

#[derive(Error, Debug)]
pub enum CocktailError {
    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("No eligible records to index")]
    NoEligibleRecords,

    #[error("Index is not ready; build or load it first")]
    IndexNotReady,

    #[error("Index file missing: {}", .0.display())]
    IndexFileMissing(PathBuf),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid result count: k must be at least 1")]
    InvalidK,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod index;
pub mod mcp;
pub mod recipes;
