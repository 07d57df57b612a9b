//! Schema definitions for the key-value store.
//!
//! # Bucket Layout
//!
//! Two process-wide tables and six per-index tables. Per-index table
//! names are derived by prefixing the index name:
//!
//! ```text
//! _indexes                  index name -> "active"           (registry)
//! _config                   reserved for engine-wide settings
//! <index>_documents         document URI -> JSON Document
//! <index>_chunks            chunk id -> JSON Chunk
//! <index>_doc_chunks        document URI -> JSON [chunk id, ...]
//! <index>_hashes            document URI -> content hash (hex)
//! <index>_metadata          "metadata" -> JSON IndexMetadata
//! <index>_vectors           vector id (8-byte BE) -> chunk id
//! ```
//!
//! Record values are JSON: self-describing and forward-compatible with
//! the addition of optional fields. The `<index>_vectors` table keeps
//! search-hit resolution at O(k log n) instead of scanning every chunk.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

/// Registry of index names. Value is an activity marker.
pub const INDEXES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("_indexes");

/// Engine-wide settings. Currently reserved.
pub const CONFIG_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("_config");

/// Marker value stored in the registry for a live index.
pub const INDEX_ACTIVE: &str = "active";

/// Key of the single metadata record in each `<index>_metadata` table.
pub const METADATA_KEY: &str = "metadata";

/// Suffixes of the per-index tables, in creation order.
pub const INDEX_BUCKETS: [&str; 6] = [
    "documents",
    "chunks",
    "doc_chunks",
    "hashes",
    "metadata",
    "vectors",
];

/// Derives a per-index table name.
#[inline]
pub fn bucket_name(index: &str, suffix: &str) -> String {
    format!("{index}_{suffix}")
}

/// Per-index metadata record.
///
/// `next_vector_id` starts at 1 and is strictly greater than every vector
/// identifier ever issued for the index (until an explicit `clear` resets
/// it together with the graph).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Next vector identifier to allocate.
    pub next_vector_id: u64,

    /// Cached document count from the last ingest.
    pub document_count: usize,

    /// Cached chunk count from the last ingest.
    pub chunk_count: usize,

    /// RFC 3339 timestamp of the last update. Empty until the first ingest.
    #[serde(default)]
    pub last_updated: String,
}

impl IndexMetadata {
    /// Metadata for a freshly created index.
    pub fn new() -> Self {
        Self {
            next_vector_id: 1,
            document_count: 0,
            chunk_count: 0,
            last_updated: String::new(),
        }
    }
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a vector identifier as a big-endian key for the vectors table.
///
/// Big-endian keeps lexicographic byte order equal to numeric order.
#[inline]
pub fn encode_vector_key(vector_id: u64) -> [u8; 8] {
    vector_id.to_be_bytes()
}

/// Decodes a vectors-table key back into a vector identifier.
#[inline]
pub fn decode_vector_key(key: &[u8; 8]) -> u64 {
    u64::from_be_bytes(*key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_derivation() {
        assert_eq!(bucket_name("docs", "chunks"), "docs_chunks");
        assert_eq!(bucket_name("docs", "doc_chunks"), "docs_doc_chunks");
    }

    #[test]
    fn test_new_metadata_starts_at_one() {
        let meta = IndexMetadata::new();
        assert_eq!(meta.next_vector_id, 1);
        assert_eq!(meta.document_count, 0);
        assert_eq!(meta.chunk_count, 0);
        assert!(meta.last_updated.is_empty());
    }

    #[test]
    fn test_metadata_forward_compatible_decode() {
        // Older records without last_updated must still decode.
        let json = r#"{"next_vector_id":7,"document_count":2,"chunk_count":9}"#;
        let meta: IndexMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.next_vector_id, 7);
        assert!(meta.last_updated.is_empty());

        // Unknown fields from newer writers are ignored.
        let json = r#"{"next_vector_id":1,"document_count":0,"chunk_count":0,"future_field":true}"#;
        assert!(serde_json::from_str::<IndexMetadata>(json).is_ok());
    }

    #[test]
    fn test_vector_key_roundtrip() {
        for id in [0u64, 1, 255, 65_536, u64::MAX] {
            assert_eq!(decode_vector_key(&encode_vector_key(id)), id);
        }
    }

    #[test]
    fn test_vector_key_ordering_matches_numeric() {
        let a = encode_vector_key(255);
        let b = encode_vector_key(256);
        assert!(a < b);
    }
}
