//! Store configuration: dimension, capacity, and graph parameters.

use crate::distance::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Configuration for a vector store.
///
/// `dim` and `metric` are fixed at construction. `max_elements` grows on
/// demand when the index fills up; `ef` is tunable at runtime through
/// [`VectorStore::set_search_quality`](crate::store::VectorStore::set_search_quality).
/// The whole record is persisted alongside the mapping so a reloaded store
/// behaves identically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vector dimensionality. Immutable for the lifetime of the store.
    pub dim: usize,
    /// Maximum element capacity of the underlying index. Doubled on demand.
    pub max_elements: usize,
    /// Max number of outgoing connections per graph node.
    pub m: usize,
    /// Candidate list size during graph construction.
    pub ef_construction: usize,
    /// Candidate list size during search. Runtime-tunable.
    pub ef: usize,
    /// Whether the index may reuse deleted slots. Carried for persistence
    /// compatibility; no deletion path exists.
    pub allow_replace_deleted: bool,
    /// Distance metric. Immutable for the lifetime of the store.
    pub metric: DistanceMetric,
}

impl StoreConfig {
    /// Create a configuration with the given dimension and default parameters.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            max_elements: 10_000,
            m: 16,
            ef_construction: 200,
            ef: 10,
            allow_replace_deleted: true,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the initial element capacity.
    pub fn with_capacity(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    /// Set the graph construction parameters.
    pub fn with_graph_params(mut self, m: usize, ef_construction: usize, ef: usize) -> Self {
        self.m = m;
        self.ef_construction = ef_construction;
        self.ef = ef;
        self
    }
}
