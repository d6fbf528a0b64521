//! The vector store: user-id-addressed inserts and searches over a
//! label-addressed nearest-neighbor index.
//!
//! One readers-writer lock guards the index, the mapping table, and the
//! configuration as a single unit: a label is allocated, inserted into the
//! index, and committed to the mapping inside one exclusive section, so a
//! concurrent search can never observe a graph node without its mapping
//! entry. File I/O during save runs inside the critical section as well —
//! a slow disk stalls readers, which is the accepted cost of keeping the
//! three persisted artifacts mutually consistent.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::distance::DistanceMetric;
use crate::error::{Result, StoreError};
use crate::hnsw::HnswAdapter;
use crate::index::AnnIndex;
use crate::mapping::MappingTable;
use crate::persistence::codec;

/// A search result containing the user identifier and distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchResult {
    pub user_id: u64,
    pub distance: f32,
}

/// Why a batch item was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The user id was already bound to a label.
    DuplicateIdentifier,
    /// The vector length did not match the store dimension.
    DimensionMismatch,
    /// The index was full and could not be grown further.
    CapacityExceeded,
    /// The index rejected the vector.
    IndexError(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DuplicateIdentifier => write!(f, "duplicate identifier"),
            SkipReason::DimensionMismatch => write!(f, "dimension mismatch"),
            SkipReason::CapacityExceeded => write!(f, "capacity exceeded"),
            SkipReason::IndexError(msg) => write!(f, "index error: {}", msg),
        }
    }
}

/// Outcome of a batch insert. Partial success is the expected case for bulk
/// ingestion: callers read `accepted` for what was actually committed rather
/// than assuming every input was added.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// User ids committed, in acceptance order.
    pub accepted: Vec<u64>,
    /// User ids not committed, each with the reason it was passed over.
    pub skipped: Vec<(u64, SkipReason)>,
}

impl BatchReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// The combined mutable state guarded by the store lock.
#[derive(Debug)]
struct StoreInner<I> {
    config: StoreConfig,
    index: I,
    mapping: MappingTable,
}

/// A thread-safe vector store addressed by caller-assigned 64-bit ids.
///
/// Internally every accepted vector gets a dense, monotonically increasing
/// label — the only identifier the index understands — and the store
/// maintains the id/label bijection across inserts, capacity growth, and
/// save/load cycles.
#[derive(Debug)]
pub struct VectorStore<I = HnswAdapter> {
    inner: RwLock<StoreInner<I>>,
}

impl VectorStore<HnswAdapter> {
    /// Create an empty HNSW-backed store with default parameters.
    pub fn new(dim: usize) -> Result<Self> {
        Self::with_config(StoreConfig::new(dim))
    }
}

impl<I: AnnIndex> VectorStore<I> {
    /// Create an empty store from an explicit configuration.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        let index = I::build(&config)?;
        Ok(Self {
            inner: RwLock::new(StoreInner {
                config,
                index,
                mapping: MappingTable::new(),
            }),
        })
    }

    /// Reconstruct a store from the three artifacts under `base`:
    /// `<base>.meta` first (the configuration is needed to build the index),
    /// then `<base>.index`, then `<base>.map`. Any missing or structurally
    /// invalid file fails the whole load.
    pub fn load(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let (config, reserved) = codec::load_metadata(&artifact_path(base, "meta"))?;
        let index = I::load(&artifact_path(base, "index"), &config)?;
        let mapping = codec::load_mappings(&artifact_path(base, "map"), reserved)?;

        if mapping.len() != index.element_count() {
            return Err(StoreError::PersistenceError(format!(
                "mapping has {} entries but the index reports {}",
                mapping.len(),
                index.element_count()
            )));
        }

        info!(
            base = %base.display(),
            elements = mapping.len(),
            dim = config.dim,
            "store loaded"
        );
        Ok(Self {
            inner: RwLock::new(StoreInner {
                config,
                index,
                mapping,
            }),
        })
    }

    /// Add a vector under a caller-assigned id.
    ///
    /// Validation (dimension, uniqueness) happens before any mutation. If
    /// the index is full its capacity is doubled first; if the index insert
    /// fails, the mapping is untouched and no label is spent.
    pub fn add_vector(&self, user_id: u64, vector: &[f32]) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if vector.len() != inner.config.dim {
            return Err(StoreError::DimensionMismatch {
                expected: inner.config.dim,
                actual: vector.len(),
            });
        }
        let label = inner.mapping.allocate(user_id)?;
        if label as usize >= inner.config.max_elements {
            grow(inner)?;
        }
        inner.index.insert(vector, label)?;
        inner.mapping.commit(user_id, label);
        Ok(())
    }

    /// Insert a batch of `(user_id, vector)` pairs under one exclusive lock
    /// acquisition, pre-sizing the reverse table once for the whole batch.
    ///
    /// Items are processed in input order. With `validate` set, duplicate
    /// ids and wrong-dimension vectors are skipped, not errors. Without it,
    /// the per-item index failure is caught and recorded instead; duplicate
    /// ids are still rejected at commit time, since overwriting a binding
    /// would orphan the old label's reverse entry and graph node. If a
    /// needed capacity growth fails, the current and all remaining items are
    /// recorded as skipped and processing stops.
    pub fn try_add_vector_batch(&self, batch: &[(u64, Vec<f32>)], validate: bool) -> BatchReport {
        let mut report = BatchReport::default();
        if batch.is_empty() {
            return report;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.mapping.reserve_for(batch.len());

        let mut capacity_exhausted = false;
        for (user_id, vector) in batch {
            if capacity_exhausted {
                report.skipped.push((*user_id, SkipReason::CapacityExceeded));
                continue;
            }
            if validate && vector.len() != inner.config.dim {
                report.skipped.push((*user_id, SkipReason::DimensionMismatch));
                continue;
            }
            let label = match inner.mapping.allocate(*user_id) {
                Ok(label) => label,
                Err(_) => {
                    report
                        .skipped
                        .push((*user_id, SkipReason::DuplicateIdentifier));
                    continue;
                }
            };
            if label as usize >= inner.config.max_elements && grow(inner).is_err() {
                capacity_exhausted = true;
                report.skipped.push((*user_id, SkipReason::CapacityExceeded));
                continue;
            }
            match inner.index.insert(vector, label) {
                Ok(()) => {
                    inner.mapping.commit(*user_id, label);
                    report.accepted.push(*user_id);
                }
                Err(StoreError::DimensionMismatch { .. }) => {
                    report.skipped.push((*user_id, SkipReason::DimensionMismatch));
                }
                Err(e) => {
                    report
                        .skipped
                        .push((*user_id, SkipReason::IndexError(e.to_string())));
                }
            }
        }

        debug!(
            accepted = report.accepted.len(),
            skipped = report.skipped.len(),
            "batch insert finished"
        );
        report
    }

    /// Search for the `k` nearest neighbors of `query`, closest first.
    ///
    /// Takes the shared lock: searches run concurrently with each other and
    /// are serialized only against writes.
    pub fn search_vectors(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let inner = self.inner.read();

        if query.len() != inner.config.dim {
            return Err(StoreError::DimensionMismatch {
                expected: inner.config.dim,
                actual: query.len(),
            });
        }

        let hits = inner.index.knn(query, k)?;
        hits.into_iter()
            .map(|(label, distance)| {
                let user_id = inner.mapping.lookup_user_id(label)?;
                Ok(SearchResult { user_id, distance })
            })
            .collect()
    }

    /// Persist the store under `base`: `<base>.index`, then `<base>.map`,
    /// then `<base>.meta`. Metadata is written last so a partially-written
    /// save is detectable by its absence.
    pub fn save(&self, base: impl AsRef<Path>) -> Result<()> {
        let base = base.as_ref();
        let inner = self.inner.write();

        inner.index.save(&artifact_path(base, "index"))?;
        codec::save_mappings(&artifact_path(base, "map"), &inner.mapping)?;
        codec::save_metadata(
            &artifact_path(base, "meta"),
            &inner.config,
            inner.mapping.reserved(),
        )?;

        info!(
            base = %base.display(),
            elements = inner.mapping.len(),
            "store saved"
        );
        Ok(())
    }

    /// Empty the mapping table without touching the index.
    ///
    /// This deliberately desynchronizes the mapping from the graph; it
    /// exists for rebuild and test workflows, and the caller owns the
    /// consequences until the mapping is repopulated or reloaded.
    pub fn clear_mappings(&self) {
        self.inner.write().mapping.clear();
    }

    /// Tune the query-time candidate list size without rebuilding.
    pub fn set_search_quality(&self, ef: usize) {
        let mut inner = self.inner.write();
        inner.config.ef = ef;
        inner.index.set_search_quality(ef);
    }

    // --- read-only accessors, all returning owned values ---

    pub fn dimension(&self) -> usize {
        self.inner.read().config.dim
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().config.max_elements
    }

    /// The number of committed vectors.
    pub fn len(&self) -> usize {
        self.inner.read().mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().mapping.is_empty()
    }

    /// The element count reported by the underlying index. Equals
    /// [`len`](Self::len) unless the mapping was explicitly cleared.
    pub fn element_count(&self) -> usize {
        self.inner.read().index.element_count()
    }

    pub fn next_label(&self) -> u64 {
        self.inner.read().mapping.next_label()
    }

    pub fn search_quality(&self) -> usize {
        self.inner.read().config.ef
    }

    pub fn metric(&self) -> DistanceMetric {
        self.inner.read().config.metric
    }

    pub fn max_connections(&self) -> usize {
        self.inner.read().config.m
    }

    pub fn ef_construction(&self) -> usize {
        self.inner.read().config.ef_construction
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.read().config
    }

    /// The label bound to `user_id`, if any.
    pub fn lookup_label(&self, user_id: u64) -> Option<u64> {
        self.inner.read().mapping.lookup_label(user_id)
    }

    /// Owned snapshot of the forward map.
    pub fn id_to_label(&self) -> HashMap<u64, u64> {
        self.inner.read().mapping.id_to_label_snapshot()
    }

    /// Owned snapshot of the reverse table, label-ordered.
    pub fn label_to_id(&self) -> Vec<u64> {
        self.inner.read().mapping.label_to_id_snapshot()
    }
}

/// Double the index capacity. Runs inside the caller's exclusive section so
/// readers never observe the index and the stored capacity out of step.
fn grow<I: AnnIndex>(inner: &mut StoreInner<I>) -> Result<()> {
    let new_capacity = inner.config.max_elements.saturating_mul(2).max(1);
    debug!(
        from = inner.config.max_elements,
        to = new_capacity,
        "growing index capacity"
    );
    inner.index.resize(new_capacity)?;
    inner.config.max_elements = new_capacity;
    Ok(())
}

fn artifact_path(base: &Path, suffix: &str) -> PathBuf {
    let mut os = OsString::from(base.as_os_str());
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}
