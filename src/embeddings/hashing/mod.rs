#[cfg(test)]
mod tests;

use super::{Embedder, Vector};
use crate::{CocktailError, Result};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic feature-hashing embedder
///
/// Each lower-cased alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, and the result is L2-normalised. Texts
/// sharing words land close together, but there is no semantic knowledge:
/// "lime" and "lemon" are unrelated. Useful offline and in tests.
///
/// Text without any alphanumeric token has no features to hash and is
/// rejected rather than mapped to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Result<Vector> {
        let mut embedding = vec![0.0_f32; self.dimension];
        let mut tokens = 0_usize;

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(CocktailError::EmbeddingUnavailable(format!(
                "text has no embeddable tokens: '{}'",
                text
            )));
        }

        // Colliding tokens with opposite signs can still cancel out
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(CocktailError::EmbeddingUnavailable(format!(
                "hashed features of '{}' cancel out",
                text
            )));
        }

        for value in &mut embedding {
            *value /= norm;
        }
        Ok(embedding)
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn name(&self) -> &str {
        "hashing"
    }
}

/// Whether `text` yields at least one token for [`HashingEmbedder`]
#[inline]
pub fn has_tokens(text: &str) -> bool {
    tokenize(text).next().is_some()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
