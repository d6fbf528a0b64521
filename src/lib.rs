//! # annstore
//!
//! An embeddable approximate-nearest-neighbor vector store that layers a
//! stable, caller-assigned 64-bit identifier space over a graph-based
//! similarity index.
//!
//! This library provides:
//! - A thread-safe [`VectorStore`] with single and batch inserts, k-NN
//!   search, and on-demand capacity growth
//! - A bijective mapping between external ids and the dense labels the
//!   index understands, kept consistent under concurrency and across
//!   save/load cycles
//! - Distance metrics (Euclidean, Cosine, Dot Product)
//! - Binary persistence of the index, the mapping, and the configuration
//!
//! ## Example
//!
//! ```rust
//! use annstore::VectorStore;
//!
//! let store = VectorStore::new(3).unwrap();
//!
//! store.add_vector(42, &[1.0, 2.0, 3.0]).unwrap();
//! store.add_vector(7, &[3.0, 2.0, 1.0]).unwrap();
//!
//! let results = store.search_vectors(&[1.0, 2.0, 3.1], 1).unwrap();
//! assert_eq!(results[0].user_id, 42);
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod flat_index;
pub mod hnsw;
pub mod index;
pub mod mapping;
pub mod metrics;
pub mod persistence;
pub mod server;
pub mod store;

pub use config::StoreConfig;
pub use distance::DistanceMetric;
pub use error::{Result, StoreError};
pub use flat_index::FlatIndex;
pub use hnsw::{HnswAdapter, HnswParams};
pub use index::AnnIndex;
pub use mapping::MappingTable;
pub use store::{BatchReport, SearchResult, SkipReason, VectorStore};
