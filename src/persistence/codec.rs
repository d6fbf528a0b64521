//! Fixed-width binary codecs for the mapping table and store metadata.
//!
//! Both formats are explicit sequences of little-endian fields — no struct
//! layout or padding dependency — so they round-trip byte-exactly across
//! platforms.
//!
//! Mapping file: `u64 count`, then `count` reverse-table entries (`u64`
//! user id per label, label-ordered), then `count` forward pairs
//! (`u64 user_id, u64 label`).
//!
//! Metadata file: `u64 dim, u64 max_elements, u64 m, u64 ef_construction,
//! u64 ef, u8 allow_replace_deleted, u8 metric, u64 reverse_reserved`
//! (50 bytes).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::config::StoreConfig;
use crate::distance::DistanceMetric;
use crate::error::{Result, StoreError};
use crate::mapping::MappingTable;

/// Size of the fixed metadata record: six u64 fields and two u8 flags.
const META_RECORD_SIZE: u64 = 6 * 8 + 2;

/// Bytes per mapping entry: one reverse-table u64 plus one forward pair.
const MAP_ENTRY_SIZE: u64 = 24;

/// Write the mapping table to `path`.
pub fn save_mappings(path: &Path, mapping: &MappingTable) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let count = mapping.next_label();
    writer.write_all(&count.to_le_bytes())?;

    for &user_id in mapping.reverse_entries() {
        writer.write_all(&user_id.to_le_bytes())?;
    }

    for (user_id, label) in mapping.forward_entries() {
        writer.write_all(&user_id.to_le_bytes())?;
        writer.write_all(&label.to_le_bytes())?;
    }

    writer.flush()?;
    debug!(path = %path.display(), entries = count, "mapping saved");
    Ok(())
}

/// Read a mapping table written by [`save_mappings`], restoring the
/// reverse-table reservation recorded in the metadata.
///
/// A zero-entry mapping is valid: an empty store round-trips. Structural
/// problems — a file length that disagrees with the entry count, or forward
/// and reverse views that do not form a bijection — fail with a
/// `PersistenceError`.
pub fn load_mappings(path: &Path, reserved: usize) -> Result<MappingTable> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let count = read_u64(&mut reader, path)?;

    let expected_len = count
        .checked_mul(MAP_ENTRY_SIZE)
        .and_then(|n| n.checked_add(8))
        .ok_or_else(|| {
            StoreError::PersistenceError(format!(
                "{}: implausible entry count {}",
                path.display(),
                count
            ))
        })?;
    if file_len != expected_len {
        return Err(StoreError::PersistenceError(format!(
            "{}: file length {} does not match entry count {}",
            path.display(),
            file_len,
            count
        )));
    }

    let count = count as usize;
    let mut label_to_id = Vec::with_capacity(count);
    for _ in 0..count {
        label_to_id.push(read_u64(&mut reader, path)?);
    }

    let mut id_to_label = HashMap::with_capacity(count);
    for _ in 0..count {
        let user_id = read_u64(&mut reader, path)?;
        let label = read_u64(&mut reader, path)?;
        if id_to_label.insert(user_id, label).is_some() {
            return Err(StoreError::PersistenceError(format!(
                "{}: duplicate user id {} in forward map",
                path.display(),
                user_id
            )));
        }
    }

    debug!(path = %path.display(), entries = count, "mapping loaded");
    MappingTable::from_parts(label_to_id, id_to_label, reserved)
}

/// Write the fixed metadata record to `path`.
pub fn save_metadata(path: &Path, config: &StoreConfig, reserved: usize) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&(config.dim as u64).to_le_bytes())?;
    writer.write_all(&(config.max_elements as u64).to_le_bytes())?;
    writer.write_all(&(config.m as u64).to_le_bytes())?;
    writer.write_all(&(config.ef_construction as u64).to_le_bytes())?;
    writer.write_all(&(config.ef as u64).to_le_bytes())?;
    writer.write_all(&[config.allow_replace_deleted as u8])?;
    writer.write_all(&[config.metric.tag()])?;
    writer.write_all(&(reserved as u64).to_le_bytes())?;

    writer.flush()?;
    debug!(path = %path.display(), "metadata saved");
    Ok(())
}

/// Read a metadata record written by [`save_metadata`].
///
/// Returns the store configuration and the persisted reverse-table
/// reservation.
pub fn load_metadata(path: &Path) -> Result<(StoreConfig, usize)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    if file_len != META_RECORD_SIZE {
        return Err(StoreError::PersistenceError(format!(
            "{}: metadata record is {} bytes, expected {}",
            path.display(),
            file_len,
            META_RECORD_SIZE
        )));
    }
    let mut reader = BufReader::new(file);

    let dim = read_u64(&mut reader, path)? as usize;
    let max_elements = read_u64(&mut reader, path)? as usize;
    let m = read_u64(&mut reader, path)? as usize;
    let ef_construction = read_u64(&mut reader, path)? as usize;
    let ef = read_u64(&mut reader, path)? as usize;
    let allow_replace_deleted = match read_u8(&mut reader, path)? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::PersistenceError(format!(
                "{}: invalid boolean byte {}",
                path.display(),
                other
            )))
        }
    };
    let metric = DistanceMetric::from_tag(read_u8(&mut reader, path)?)?;
    let reserved = read_u64(&mut reader, path)? as usize;

    let config = StoreConfig {
        dim,
        max_elements,
        m,
        ef_construction,
        ef,
        allow_replace_deleted,
        metric,
    };
    debug!(path = %path.display(), dim, max_elements, "metadata loaded");
    Ok((config, reserved))
}

fn read_u64(reader: &mut impl Read, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(|_| {
        StoreError::PersistenceError(format!("{}: truncated record", path.display()))
    })?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u8(reader: &mut impl Read, path: &Path) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf).map_err(|_| {
        StoreError::PersistenceError(format!("{}: truncated record", path.display()))
    })?;
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_mapping(ids: &[u64]) -> MappingTable {
        let mut mapping = MappingTable::new();
        for &id in ids {
            let label = mapping.allocate(id).unwrap();
            mapping.commit(id, label);
        }
        mapping
    }

    #[test]
    fn test_mapping_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.map");

        let mapping = sample_mapping(&[900, 17, 3, 42_000_000_000]);
        save_mappings(&path, &mapping).unwrap();

        let loaded = load_mappings(&path, mapping.reserved()).unwrap();
        assert_eq!(loaded.next_label(), 4);
        for &id in &[900u64, 17, 3, 42_000_000_000] {
            let label = loaded.lookup_label(id).unwrap();
            assert_eq!(mapping.lookup_label(id).unwrap(), label);
            assert_eq!(loaded.lookup_user_id(label).unwrap(), id);
        }
    }

    #[test]
    fn test_empty_mapping_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.map");

        let mapping = MappingTable::new();
        save_mappings(&path, &mapping).unwrap();

        let loaded = load_mappings(&path, mapping.reserved()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.next_label(), 0);
    }

    #[test]
    fn test_mapping_rejects_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.map");

        let mapping = sample_mapping(&[1, 2, 3]);
        save_mappings(&path, &mapping).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        assert!(matches!(
            load_mappings(&path, 0),
            Err(StoreError::PersistenceError(_))
        ));
    }

    #[test]
    fn test_mapping_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_mappings(&dir.path().join("nope.map"), 0);
        assert!(matches!(result, Err(StoreError::IoError(_))));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.meta");

        let config = StoreConfig::new(64)
            .with_metric(DistanceMetric::Cosine)
            .with_capacity(5000)
            .with_graph_params(12, 150, 40);
        save_metadata(&path, &config, 2000).unwrap();

        let (loaded, reserved) = load_metadata(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(reserved, 2000);
    }

    #[test]
    fn test_metadata_rejects_wrong_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.meta");
        std::fs::write(&path, [0u8; 10]).unwrap();

        assert!(matches!(
            load_metadata(&path),
            Err(StoreError::PersistenceError(_))
        ));
    }

    #[test]
    fn test_metadata_rejects_bad_metric_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.meta");

        let config = StoreConfig::new(8);
        save_metadata(&path, &config, 1000).unwrap();

        // The metric tag is the 42nd byte (after five u64s and one bool)
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[41] = 99;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load_metadata(&path),
            Err(StoreError::PersistenceError(_))
        ));
    }
}
