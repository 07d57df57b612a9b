//! Configuration types for semdex.
//!
//! The [`Config`] struct controls engine behavior:
//! - Data directory and embedding service endpoint
//! - Chunking parameters (token window and overlap)
//! - Batch embedding concurrency and graph autosave
//! - HNSW tuning parameters
//!
//! # Example
//! ```rust
//! use semdex::Config;
//!
//! // Defaults: Ollama on localhost, nomic-embed-text, 512/50 chunking
//! let config = Config::new("./semdex-data");
//!
//! // Customize
//! let config = Config {
//!     chunk_size: 256,
//!     chunk_overlap: 25,
//!     ..Config::new("./semdex-data")
//! };
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemdexError};

/// Minimum allowed chunk size, in tokens.
pub const MIN_CHUNK_SIZE: usize = 50;

/// Engine configuration.
///
/// All fields beyond `data_path` have sensible defaults; use struct update
/// syntax to override specific settings.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the key-value store and per-index graph files.
    pub data_path: PathBuf,

    /// Base URL of the embedding service (e.g. `http://localhost:11434`).
    pub embedding_url: String,

    /// Embedding model identifier (e.g. `nomic-embed-text`).
    pub embedding_model: String,

    /// Chunk window size in tokens. Must be at least [`MIN_CHUNK_SIZE`].
    pub chunk_size: usize,

    /// Token overlap between consecutive chunks. Must be smaller than
    /// `chunk_size`.
    pub chunk_overlap: usize,

    /// Worker threads for batch embedding. Clamped to at least 1.
    pub max_workers: usize,

    /// Persist the ANN graph at the end of every mutating operation.
    pub auto_save: bool,

    /// HTTP client timeout for embedding requests.
    pub http_timeout: Duration,

    /// HNSW graph parameters.
    pub hnsw: HnswConfig,
}

impl Config {
    /// Creates a configuration with defaults for everything except the
    /// data directory.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            embedding_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            max_workers: 8,
            auto_save: true,
            http_timeout: Duration::from_secs(30),
            hnsw: HnswConfig::default(),
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `IndexManager::open()`. You can also call
    /// this explicitly to check a configuration before opening.
    ///
    /// # Errors
    /// Returns a `Config` error if:
    /// - `data_path`, `embedding_url`, or `embedding_model` is empty
    /// - chunking parameters violate the chunker's rules
    /// - HNSW parameters are zero
    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(SemdexError::config("data path cannot be empty"));
        }
        if self.embedding_url.is_empty() {
            return Err(SemdexError::config("embedding URL cannot be empty"));
        }
        if self.embedding_model.is_empty() {
            return Err(SemdexError::config("embedding model cannot be empty"));
        }

        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(SemdexError::config(
                "chunk size must be at least 50 tokens",
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SemdexError::config(
                "overlap cannot be larger than or equal to chunk size",
            ));
        }

        if self.hnsw.m == 0 {
            return Err(SemdexError::config("hnsw.m must be greater than 0"));
        }
        if self.hnsw.ef_search == 0 {
            return Err(SemdexError::config("hnsw.ef_search must be greater than 0"));
        }
        if self.hnsw.max_elements == 0 {
            return Err(SemdexError::config(
                "hnsw.max_elements must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Worker count clamped to at least one thread.
    pub fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

/// Distance function used by an index's HNSW graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    /// Cosine distance in `[0, 2]`; converted to a `[0, 1]` similarity
    /// score as `1 - d/2`.
    #[default]
    Cosine,

    /// Euclidean (L2) distance; converted to a `(0, 1]` similarity score
    /// as `1 / (1 + d)`.
    Euclidean,
}

/// Configuration for the HNSW vector index.
///
/// Controls the trade-off between build time, memory usage, and recall.
/// Defaults match the embedding workloads this engine targets (thousands
/// to hundreds of thousands of chunks per index).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum bidirectional connections per node (M parameter).
    pub m: usize,

    /// Number of candidates tracked during search. Must be >= k.
    pub ef_search: usize,

    /// Number of candidates tracked during graph construction.
    pub ef_construction: usize,

    /// Maximum number of layers in the skip-list structure.
    pub max_layer: usize,

    /// Initial pre-allocated capacity (number of vectors).
    pub max_elements: usize,

    /// Distance function.
    pub distance: DistanceKind,

    /// Level-generation seed. Logged for reproducibility; the graph
    /// library manages its own level RNG.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_search: 20,
            ef_construction: 200,
            max_layer: 16,
            max_elements: 10_000,
            distance: DistanceKind::Cosine,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new("./data");
        assert_eq!(config.embedding_url, "http://localhost:11434");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.max_workers, 8);
        assert!(config.auto_save);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::new("./data").validate().is_ok());
    }

    #[test]
    fn test_validate_empty_data_path() {
        let config = Config::new("");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("data path"));
    }

    #[test]
    fn test_validate_empty_model() {
        let config = Config {
            embedding_model: String::new(),
            ..Config::new("./data")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_chunk_size_too_small() {
        let config = Config {
            chunk_size: 49,
            ..Config::new("./data")
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 50 tokens"));
    }

    #[test]
    fn test_validate_overlap_not_smaller_than_chunk_size() {
        let config = Config {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Config::new("./data")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hnsw_zero_m() {
        let config = Config {
            hnsw: HnswConfig {
                m: 0,
                ..Default::default()
            },
            ..Config::new("./data")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers_clamped() {
        let config = Config {
            max_workers: 0,
            ..Config::new("./data")
        };
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn test_hnsw_defaults() {
        let hnsw = HnswConfig::default();
        assert_eq!(hnsw.m, 16);
        assert_eq!(hnsw.ef_search, 20);
        assert_eq!(hnsw.ef_construction, 200);
        assert_eq!(hnsw.distance, DistanceKind::Cosine);
        assert_eq!(hnsw.seed, 42);
    }

    #[test]
    fn test_distance_kind_serde() {
        let json = serde_json::to_string(&DistanceKind::Euclidean).unwrap();
        assert_eq!(json, "\"euclidean\"");
        let back: DistanceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DistanceKind::Euclidean);
    }
}
