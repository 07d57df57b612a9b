//! Error types for semdex.
//!
//! semdex uses a hierarchical error system:
//! - `SemdexError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `NotFoundError`) provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use semdex::{Config, IndexManager, Result};
//!
//! fn example(config: Config) -> Result<()> {
//!     let manager = IndexManager::open(config)?;
//!     // ... operations that may fail ...
//!     manager.close()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for semdex operations.
pub type Result<T> = std::result::Result<T, SemdexError>;

/// Top-level error enum for all semdex operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum SemdexError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Entity already exists (e.g. creating an index twice).
    #[error("Index already exists: {name}")]
    AlreadyExists {
        /// Name of the conflicting index.
        name: String,
    },

    /// A vector's length does not match the index dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the index was constructed with.
        expected: usize,
        /// Dimension of the offending vector.
        got: usize,
    },

    /// Batch arguments with inconsistent lengths.
    #[error("Argument mismatch: {reason}")]
    ArgumentMismatch {
        /// Description of the inconsistency.
        reason: String,
    },

    /// Embedding generation error (network, non-2xx, empty result).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index error (HNSW operations, graph snapshot I/O).
    #[error("Vector index error: {0}")]
    Vector(String),

    /// Text chunking error (token decode failure).
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SemdexError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a vector index error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Creates a chunking error with the given message.
    pub fn chunking(msg: impl Into<String>) -> Self {
        Self::Chunking(msg.into())
    }

    /// Creates an argument mismatch error with the given reason.
    pub fn argument(reason: impl Into<String>) -> Self {
        Self::ArgumentMismatch {
            reason: reason.into(),
        }
    }

    /// Creates a dimension mismatch error.
    pub fn dimension(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is an "already exists" error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if this is a dimension mismatch error.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an embedding error.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

// Convert serde_json errors to StorageError (record encoding)
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to SemdexError for convenience
impl From<redb::Error> for SemdexError {
    fn from(err: redb::Error) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for SemdexError {
    fn from(err: redb::DatabaseError) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for SemdexError {
    fn from(err: redb::TransactionError) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for SemdexError {
    fn from(err: redb::CommitError) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for SemdexError {
    fn from(err: redb::TableError) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for SemdexError {
    fn from(err: redb::StorageError) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for SemdexError {
    fn from(err: serde_json::Error) -> Self {
        SemdexError::Storage(StorageError::from(err))
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Index with the given name not found.
    #[error("Index not found: {0}")]
    Index(String),

    /// Document with the given URI not found.
    #[error("Document not found: {0}")]
    Document(String),

    /// Chunk with the given id not found.
    #[error("Chunk not found: {0}")]
    Chunk(String),
}

impl NotFoundError {
    /// Creates an index not found error.
    pub fn index(name: impl ToString) -> Self {
        Self::Index(name.to_string())
    }

    /// Creates a document not found error.
    pub fn document(uri: impl ToString) -> Self {
        Self::Document(uri.to_string())
    }

    /// Creates a chunk not found error.
    pub fn chunk(id: impl ToString) -> Self {
        Self::Chunk(id.to_string())
    }
}
