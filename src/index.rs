//! The contract between the store and its nearest-neighbor index backends.

use std::path::Path;

use crate::config::StoreConfig;
use crate::error::Result;

/// An approximate-nearest-neighbor index addressed by dense `u64` labels.
///
/// Implementations own the distance metric and the vector data; the
/// `VectorStore` handles user-id-to-label mapping on top. Labels are
/// allocated by the store, strictly increasing from 0, and never reused.
pub trait AnnIndex: Sized + Send + Sync {
    /// Build an empty index from the store configuration.
    fn build(config: &StoreConfig) -> Result<Self>;

    /// Insert a vector under the given label.
    ///
    /// Fails with `DimensionMismatch` if the vector length is wrong,
    /// `CapacityExceeded` if the index is full, or `IndexError` for any
    /// backend failure. A failed insert must leave the index unchanged.
    fn insert(&mut self, vector: &[f32], label: u64) -> Result<()>;

    /// Search for the `k` nearest neighbors of `query`.
    ///
    /// Returns `(label, distance)` pairs sorted by distance ascending, of
    /// length `min(k, element_count)`.
    fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>>;

    /// Grow the index to hold `new_capacity` elements.
    ///
    /// An expensive reallocation; callers issue it only when capacity is
    /// actually reached, never per insert.
    fn resize(&mut self, new_capacity: usize) -> Result<()>;

    /// The number of vectors currently in the index.
    fn element_count(&self) -> usize;

    /// The maximum number of vectors the index can hold before a resize.
    fn capacity(&self) -> usize;

    /// Persist the index state as an opaque binary blob at `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Reconstruct an index from a blob written by [`save`](Self::save).
    ///
    /// `config` supplies the dimension, capacity, and graph parameters the
    /// blob was written under.
    fn load(path: &Path, config: &StoreConfig) -> Result<Self>;

    /// Tune the query-time candidate list size without rebuilding.
    fn set_search_quality(&mut self, ef: usize);
}
