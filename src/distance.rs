//! Distance metrics for vector similarity

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Distance metrics for measuring vector similarity.
///
/// Fixed at store construction and persisted in the metadata record so a
/// reloaded store searches the same space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    Euclidean,
    /// Cosine similarity (converted to distance: 1 - similarity)
    Cosine,
    /// Dot product (negated for minimum distance)
    DotProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal dimension.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "vectors must have equal dimension");
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }

    /// Single-byte tag used in the persisted metadata record.
    pub(crate) fn tag(self) -> u8 {
        match self {
            DistanceMetric::Euclidean => 0,
            DistanceMetric::Cosine => 1,
            DistanceMetric::DotProduct => 2,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(DistanceMetric::Euclidean),
            1 => Ok(DistanceMetric::Cosine),
            2 => Ok(DistanceMetric::DotProduct),
            other => Err(StoreError::PersistenceError(format!(
                "unknown distance metric tag: {}",
                other
            ))),
        }
    }
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute cosine distance between two vectors (1 - cosine similarity).
/// A zero-norm operand yields the maximum distance of 1.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot_product(a, b) / (norm_a * norm_b);

    // Clamp to [-1, 1] to handle floating point errors
    1.0 - similarity.clamp(-1.0, 1.0)
}

/// Compute dot product of two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
