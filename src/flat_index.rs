//! Brute-force flat index — O(n) k-NN search with the scan parallelized
//! across cores. Serves as the exact ground truth the HNSW backend is
//! measured against.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::distance::DistanceMetric;
use crate::error::{Result, StoreError};
use crate::index::AnnIndex;
use crate::persistence::serialization;

/// A flat (brute-force) index that computes distance to every stored vector.
#[derive(Debug)]
pub struct FlatIndex {
    vectors: HashMap<u64, Vec<f32>>,
    metric: DistanceMetric,
    dim: usize,
    max_elements: usize,
}

#[derive(Serialize, Deserialize)]
struct FlatSnapshot {
    vectors: HashMap<u64, Vec<f32>>,
}

impl FlatIndex {
    /// Get the vector stored under a label.
    pub fn get_vector(&self, label: u64) -> Option<&[f32]> {
        self.vectors.get(&label).map(|v| v.as_slice())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl AnnIndex for FlatIndex {
    fn build(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            vectors: HashMap::new(),
            metric: config.metric,
            dim: config.dim,
            max_elements: config.max_elements,
        })
    }

    fn insert(&mut self, vector: &[f32], label: u64) -> Result<()> {
        self.check_dim(vector)?;
        if self.vectors.len() >= self.max_elements {
            return Err(StoreError::CapacityExceeded {
                capacity: self.max_elements,
            });
        }
        self.vectors.insert(label, vector.to_vec());
        Ok(())
    }

    fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        self.check_dim(query)?;

        let mut results: Vec<(u64, f32)> = self
            .vectors
            .par_iter()
            .map(|(&label, vec)| (label, self.metric.distance(query, vec)))
            .collect();

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity > self.max_elements {
            self.max_elements = new_capacity;
        }
        Ok(())
    }

    fn element_count(&self) -> usize {
        self.vectors.len()
    }

    fn capacity(&self) -> usize {
        self.max_elements
    }

    fn save(&self, path: &Path) -> Result<()> {
        let snapshot = FlatSnapshot {
            vectors: self.vectors.clone(),
        };
        let payload = serialization::to_bincode(&snapshot)?;
        serialization::write_framed(path, &payload)
    }

    fn load(path: &Path, config: &StoreConfig) -> Result<Self> {
        let payload = serialization::read_framed(path)?;
        let snapshot: FlatSnapshot = serialization::from_bincode(&payload)?;
        Ok(Self {
            vectors: snapshot.vectors,
            metric: config.metric,
            dim: config.dim,
            max_elements: config.max_elements,
        })
    }

    fn set_search_quality(&mut self, _ef: usize) {
        // exact search has no quality knob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> StoreConfig {
        StoreConfig::new(3).with_capacity(100)
    }

    #[test]
    fn test_flat_index_basic() {
        let mut index = FlatIndex::build(&config()).unwrap();
        index.insert(&[1.0, 0.0, 0.0], 0).unwrap();
        index.insert(&[0.0, 1.0, 0.0], 1).unwrap();
        index.insert(&[1.0, 1.0, 0.0], 2).unwrap();

        let results = index.knn(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0); // exact match
        assert!(results[0].1 < 1e-6);
    }

    #[test]
    fn test_flat_index_capacity() {
        let mut index = FlatIndex::build(&StoreConfig::new(2).with_capacity(1)).unwrap();
        index.insert(&[0.0, 0.0], 0).unwrap();

        let err = index.insert(&[1.0, 1.0], 1).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { capacity: 1 }));

        index.resize(2).unwrap();
        index.insert(&[1.0, 1.0], 1).unwrap();
        assert_eq!(index.element_count(), 2);
    }

    #[test]
    fn test_flat_index_get_vector() {
        let mut index = FlatIndex::build(&config()).unwrap();
        index.insert(&[1.0, 2.0, 3.0], 0).unwrap();

        assert_eq!(index.get_vector(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(index.get_vector(99), None);
    }

    #[test]
    fn test_flat_index_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flat.index");
        let config = config();

        let mut index = FlatIndex::build(&config).unwrap();
        index.insert(&[1.0, 0.0, 0.0], 7).unwrap();
        index.insert(&[0.0, 1.0, 0.0], 8).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path, &config).unwrap();
        assert_eq!(loaded.element_count(), 2);
        let results = loaded.knn(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0, 7);
    }
}
