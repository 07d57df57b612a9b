//! # semdex
//!
//! Embedded semantic document search engine.
//!
//! semdex ingests batches of text documents, splits them into overlapping
//! token windows, obtains dense vector embeddings from an external
//! embedding service, stores chunks with their vectors in an embedded
//! key-value store, and maintains an in-memory HNSW graph per index for
//! approximate nearest-neighbor search.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use semdex::{BatchOptions, CancelToken, Config, Document, IndexManager};
//!
//! // Open or create a data directory
//! let manager = IndexManager::open(Config::new("./semdex-data"))?;
//!
//! // Create an index
//! let index = manager.create_index("docs")?;
//!
//! // Ingest documents (unchanged documents are skipped on re-ingest)
//! let result = index.ingest(
//!     &[Document::new("doc1", "Intro", "Some text to index...")],
//!     &BatchOptions::default(),
//!     None,
//!     &CancelToken::new(),
//! )?;
//! println!("indexed {} chunks", result.processed_chunks);
//!
//! // Semantic search
//! for hit in index.search("text about introductions", 5)? {
//!     println!("{:.3}  {}", hit.score, hit.document.uri);
//! }
//!
//! // Clean up
//! manager.close()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Index
//!
//! An **index** is an isolated namespace of documents with its own HNSW
//! graph. Indexes are registered in a single embedded store and addressed
//! by name.
//!
//! ### Ingest pipeline
//!
//! Batch ingest is idempotent: each document's title, content, and
//! metadata are hashed, and documents whose stored hash matches are
//! skipped. Changed documents are re-chunked, re-embedded, and their old
//! chunks replaced. Per-document failures are collected in the batch
//! result without aborting the rest of the batch.
//!
//! ### Embedding service
//!
//! Embeddings come from an external HTTP service speaking the Ollama
//! `/api/embed` contract. Any other provider can be plugged in through
//! the [`embedding::Embedder`] trait and
//! [`IndexManager::open_with_embedder`].
//!
//! ## Thread Safety
//!
//! [`IndexManager`] and [`SearchIndex`] are `Send + Sync`; share them
//! across threads with `Arc`. Mutations on one index are serialized;
//! searches run concurrently and see either the pre- or post-mutation
//! graph, never a half-applied state.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod index;
mod manager;
mod types;

pub mod chunker;
pub mod embedding;
pub mod storage;
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Entry points
pub use index::SearchIndex;
pub use manager::IndexManager;

// Configuration
pub use config::{Config, DistanceKind, HnswConfig, MIN_CHUNK_SIZE};

// Error handling
pub use error::{NotFoundError, Result, SemdexError, StorageError};

// Core types
pub use types::{
    BatchOptions, BatchResult, CancelToken, Chunk, Document, IndexStats, Metadata, ProgressStage,
    ProgressUpdate, SearchResult,
};

// Storage metadata (for advanced users)
pub use storage::schema::IndexMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common semdex usage.
///
/// ```rust
/// use semdex::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, SemdexError};
    pub use crate::index::SearchIndex;
    pub use crate::manager::IndexManager;
    pub use crate::types::{
        BatchOptions, BatchResult, CancelToken, Document, IndexStats, SearchResult,
    };
}
