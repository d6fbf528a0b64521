//! Persistence layer: binary codecs for the mapping table, store metadata,
//! and the framed index blobs.

pub mod codec;
pub mod serialization;
