//! Serialization utilities: bincode helpers and checksummed blob framing
//! shared by the index backends.
//!
//! A framed blob is written as: [length: u32][crc32: u32][payload], all
//! little-endian. A length or checksum mismatch on read is reported as a
//! persistence error rather than handed to the deserializer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::PersistenceError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::PersistenceError(e.to_string()))
}

/// Write a checksummed blob to `path`.
pub fn write_framed(path: &Path, payload: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let len = payload.len() as u32;
    let crc = crc32fast::hash(payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a checksummed blob written by [`write_framed`].
pub fn read_framed(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(|_| {
        StoreError::PersistenceError(format!("{}: truncated blob header", path.display()))
    })?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut crc_buf = [0u8; 4];
    reader.read_exact(&mut crc_buf).map_err(|_| {
        StoreError::PersistenceError(format!("{}: truncated blob header", path.display()))
    })?;
    let expected_crc = u32::from_le_bytes(crc_buf);

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|_| {
        StoreError::PersistenceError(format!("{}: truncated blob payload", path.display()))
    })?;

    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        return Err(StoreError::PersistenceError(format!(
            "{}: blob checksum mismatch",
            path.display()
        )));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    #[test]
    fn test_bincode_roundtrip() {
        let value: Vec<(u64, Vec<f32>)> = vec![(42, vec![1.0, 2.0, 3.0])];
        let bytes = to_bincode(&value).unwrap();
        let decoded: Vec<(u64, Vec<f32>)> = from_bincode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_framed_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");

        let payload = b"some index bytes";
        write_framed(&path, payload).unwrap();

        let read = read_framed(&path).unwrap();
        assert_eq!(read, payload);
    }

    #[test]
    fn test_framed_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");

        write_framed(&path, b"some index bytes").unwrap();

        // Flip a payload byte
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            use std::io::{Seek, SeekFrom, Write};
            file.seek(SeekFrom::Start(8)).unwrap();
            file.write_all(&[0xFF]).unwrap();
        }

        assert!(matches!(
            read_framed(&path),
            Err(StoreError::PersistenceError(_))
        ));
    }

    #[test]
    fn test_framed_detects_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");

        write_framed(&path, b"some index bytes").unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(
            read_framed(&path),
            Err(StoreError::PersistenceError(_))
        ));
    }

    #[test]
    fn test_framed_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_framed(&dir.path().join("does-not-exist.bin"));
        assert!(matches!(result, Err(StoreError::IoError(_))));
    }
}
