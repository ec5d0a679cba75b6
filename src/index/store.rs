use crate::{CocktailError, Result};

/// Row-major storage for vectors of one fixed dimension
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorStore {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(dimension: usize, rows: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension.saturating_mul(rows)),
        }
    }

    /// Rebuild a store from flat row-major values
    #[inline]
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(CocktailError::DimensionMismatch {
                expected: dimension,
                actual: data.len(),
            });
        }
        Ok(Self { dimension, data })
    }

    /// Append one vector; its length must equal the store dimension
    #[inline]
    pub fn push(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(CocktailError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Vectors in insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    #[inline]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}
