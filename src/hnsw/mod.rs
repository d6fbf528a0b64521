//! HNSW (Hierarchical Navigable Small World) index module.

pub mod graph;
pub mod neighbor_queue;

pub use graph::{HnswGraph, HnswParams};

use std::path::Path;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::index::AnnIndex;
use crate::persistence::serialization;

/// An HNSW-backed implementation of the [`AnnIndex`] contract.
///
/// Owns the graph and the dimension check at the contract boundary; the
/// graph itself works in unchecked dense node ids.
#[derive(Debug)]
pub struct HnswAdapter {
    graph: HnswGraph,
    dim: usize,
}

impl HnswAdapter {
    fn params_from(config: &StoreConfig) -> HnswParams {
        HnswParams::new(config.m, config.ef_construction, config.ef)
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

impl AnnIndex for HnswAdapter {
    fn build(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            graph: HnswGraph::new(
                config.metric,
                Self::params_from(config),
                config.max_elements,
            ),
            dim: config.dim,
        })
    }

    fn insert(&mut self, vector: &[f32], label: u64) -> Result<()> {
        self.check_dim(vector)?;
        self.graph.insert(label as usize, vector.to_vec())
    }

    fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        self.check_dim(query)?;
        let results = self.graph.search_knn(query, k)?;
        Ok(results
            .into_iter()
            .map(|n| (n.id as u64, n.distance))
            .collect())
    }

    fn resize(&mut self, new_capacity: usize) -> Result<()> {
        self.graph.resize(new_capacity);
        Ok(())
    }

    fn element_count(&self) -> usize {
        self.graph.len()
    }

    fn capacity(&self) -> usize {
        self.graph.capacity()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let payload = serialization::to_bincode(&self.graph.snapshot())?;
        serialization::write_framed(path, &payload)
    }

    fn load(path: &Path, config: &StoreConfig) -> Result<Self> {
        let payload = serialization::read_framed(path)?;
        let snapshot = serialization::from_bincode(&payload)?;
        Ok(Self {
            graph: HnswGraph::restore(
                snapshot,
                config.metric,
                Self::params_from(config),
                config.max_elements,
            ),
            dim: config.dim,
        })
    }

    fn set_search_quality(&mut self, ef: usize) {
        self.graph.set_ef(ef);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use tempfile::TempDir;

    fn small_config() -> StoreConfig {
        StoreConfig::new(3)
            .with_capacity(100)
            .with_graph_params(4, 32, 16)
    }

    #[test]
    fn test_adapter_insert_and_knn() {
        let mut index = HnswAdapter::build(&small_config()).unwrap();
        index.insert(&[1.0, 0.0, 0.0], 0).unwrap();
        index.insert(&[0.0, 1.0, 0.0], 1).unwrap();
        index.insert(&[1.0, 1.0, 0.0], 2).unwrap();

        let results = index.knn(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0); // exact match
        assert!(results[0].1 < 1e-5);
    }

    #[test]
    fn test_adapter_dimension_check() {
        let mut index = HnswAdapter::build(&small_config()).unwrap();
        let err = index.insert(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.knn(&[1.0], 1).is_err());
        assert_eq!(index.element_count(), 0);
    }

    #[test]
    fn test_adapter_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.index");
        let config = small_config();

        let mut index = HnswAdapter::build(&config).unwrap();
        for i in 0..10u64 {
            index
                .insert(&[i as f32, 0.0, 0.0], i)
                .unwrap();
        }
        let before = index.knn(&[3.2, 0.0, 0.0], 3).unwrap();
        index.save(&path).unwrap();

        let loaded = HnswAdapter::load(&path, &config).unwrap();
        assert_eq!(loaded.element_count(), 10);
        let after = loaded.knn(&[3.2, 0.0, 0.0], 3).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_adapter_metric_from_config() {
        let config = small_config().with_metric(DistanceMetric::Cosine);
        let mut index = HnswAdapter::build(&config).unwrap();
        index.insert(&[1.0, 0.0, 0.0], 0).unwrap();
        index.insert(&[0.0, 1.0, 0.0], 1).unwrap();

        // Same direction, different magnitude: cosine distance ~0
        let results = index.knn(&[5.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 < 1e-5);
    }

    #[test]
    fn test_adapter_search_quality() {
        let mut index = HnswAdapter::build(&small_config()).unwrap();
        for i in 0..50u64 {
            index.insert(&[i as f32, 0.0, 0.0], i).unwrap();
        }
        index.set_search_quality(100);
        let results = index.knn(&[25.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].0, 25);
    }
}
