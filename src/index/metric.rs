use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance function used for ranking; smaller is closer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance (L2²)
    #[default]
    SquaredEuclidean,
    /// `1 - cos θ`; a zero vector is at distance 1 from everything
    Cosine,
}

impl DistanceMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Cosine => "cosine",
        }
    }

    /// Distance between two vectors of equal length
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::SquaredEuclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Self::Cosine => {
                let mut dot = 0.0_f32;
                let mut norm_a = 0.0_f32;
                let mut norm_b = 0.0_f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squared_euclidean" => Ok(Self::SquaredEuclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!("unknown distance metric '{}'", other)),
        }
    }
}
