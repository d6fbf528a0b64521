//! Save/load round-trip tests across the three persisted artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use annstore::{DistanceMetric, StoreConfig, StoreError, VectorStore};
use tempfile::TempDir;

fn artifact(base: &Path, suffix: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

fn populated_store(dim: usize, n: u64) -> VectorStore {
    let store = VectorStore::new(dim).unwrap();
    for i in 0..n {
        let v: Vec<f32> = (0..dim).map(|d| d as f32 + i as f32 * 0.1).collect();
        store.add_vector(i * 10, &v).unwrap();
    }
    store
}

#[test]
fn test_roundtrip_preserves_state_and_results() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("store");

    let store = populated_store(10, 10);
    let query: Vec<f32> = (0..10).map(|d| d as f32 + 0.81).collect();
    let before: Vec<(u64, f32)> = store
        .search_vectors(&query, 5)
        .unwrap()
        .iter()
        .map(|r| (r.user_id, r.distance))
        .collect();

    store.save(&base).unwrap();
    assert!(artifact(&base, "index").exists());
    assert!(artifact(&base, "map").exists());
    assert!(artifact(&base, "meta").exists());

    let reloaded: VectorStore = VectorStore::load(&base).unwrap();

    assert_eq!(reloaded.len(), store.len());
    assert_eq!(reloaded.next_label(), store.next_label());
    assert_eq!(reloaded.element_count(), store.element_count());
    assert_eq!(reloaded.id_to_label(), store.id_to_label());
    assert_eq!(reloaded.label_to_id(), store.label_to_id());
    assert_eq!(reloaded.config(), store.config());

    let after: Vec<(u64, f32)> = reloaded
        .search_vectors(&query, 5)
        .unwrap()
        .iter()
        .map(|r| (r.user_id, r.distance))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_empty_store_roundtrips() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("empty");

    let store = VectorStore::new(8).unwrap();
    store.save(&base).unwrap();

    let reloaded: VectorStore = VectorStore::load(&base).unwrap();
    assert!(reloaded.is_empty());
    assert_eq!(reloaded.next_label(), 0);
    assert_eq!(reloaded.dimension(), 8);
    assert!(reloaded.search_vectors(&[0.0; 8], 3).unwrap().is_empty());
}

#[test]
fn test_metric_and_parameters_persist() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("cosine");

    let config = StoreConfig::new(4)
        .with_metric(DistanceMetric::Cosine)
        .with_graph_params(8, 120, 33);
    let store: VectorStore = VectorStore::with_config(config).unwrap();
    store.add_vector(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    store.set_search_quality(77);
    store.save(&base).unwrap();

    let reloaded: VectorStore = VectorStore::load(&base).unwrap();
    let loaded = reloaded.config();
    assert_eq!(loaded.metric, DistanceMetric::Cosine);
    assert_eq!(loaded.m, 8);
    assert_eq!(loaded.ef_construction, 120);
    assert_eq!(loaded.ef, 77);
    assert_eq!(reloaded.search_quality(), 77);
}

#[test]
fn test_missing_artifacts_are_fatal() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("store");

    // nothing saved at all
    assert!(VectorStore::<annstore::HnswAdapter>::load(&base).is_err());

    let store = populated_store(4, 3);
    store.save(&base).unwrap();

    for suffix in ["index", "map", "meta"] {
        let path = artifact(&base, suffix);
        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(
            VectorStore::<annstore::HnswAdapter>::load(&base).is_err(),
            "load must fail without the {} artifact",
            suffix
        );
        fs::write(&path, bytes).unwrap();
    }

    // intact again
    assert!(VectorStore::<annstore::HnswAdapter>::load(&base).is_ok());
}

#[test]
fn test_truncated_mapping_is_rejected() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("store");

    let store = populated_store(4, 5);
    store.save(&base).unwrap();

    let map_path = artifact(&base, "map");
    let bytes = fs::read(&map_path).unwrap();
    fs::write(&map_path, &bytes[..bytes.len() - 8]).unwrap();

    let result = VectorStore::<annstore::HnswAdapter>::load(&base);
    assert!(matches!(result, Err(StoreError::PersistenceError(_))));
}

#[test]
fn test_mapping_index_count_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let base_a = dir.path().join("a");
    let base_b = dir.path().join("b");

    populated_store(4, 3).save(&base_a).unwrap();
    populated_store(4, 2).save(&base_b).unwrap();

    // splice b's smaller mapping under a's index
    fs::copy(artifact(&base_b, "map"), artifact(&base_a, "map")).unwrap();

    let result = VectorStore::<annstore::HnswAdapter>::load(&base_a);
    assert!(matches!(result, Err(StoreError::PersistenceError(_))));
}

#[test]
fn test_save_then_mutate_then_save_again() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("store");

    let store = populated_store(4, 3);
    store.save(&base).unwrap();

    store.add_vector(999, &[9.0, 9.0, 9.0, 9.0]).unwrap();
    store.save(&base).unwrap();

    let reloaded: VectorStore = VectorStore::load(&base).unwrap();
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.lookup_label(999), Some(3));
}
