//! Core data types for semdex: documents, chunks, results, and the
//! batch-ingest control surface (progress updates and cancellation).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Free-form document metadata: string keys mapping to scalars, arrays,
/// or nested maps.
///
/// Backed by `serde_json::Map`, which keeps keys sorted. The sorted order
/// is what makes [`Document::content_hash`] stable across logically equal
/// maps built in different insertion orders.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document submitted for indexing.
///
/// The URI is the primary key within an index and part of the
/// change-detection surface: re-ingesting the same URI with identical
/// title, content, and metadata is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-provided URI, unique within an index.
    pub uri: String,

    /// Document title.
    pub title: String,

    /// Full text content.
    pub content: String,

    /// Optional metadata, inherited by the document's chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// Creates a document without metadata.
    pub fn new(
        uri: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
            content: content.into(),
            metadata: None,
        }
    }

    /// Attaches metadata to the document.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Computes the change-detection hash for this document.
    ///
    /// `SHA-256(title || content || canonical_json(metadata))`, lowercase
    /// hex. Metadata is serialized with sorted keys, so two logically equal
    /// maps always hash identically.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(self.content.as_bytes());
        if let Some(metadata) = &self.metadata {
            let canonical = serde_json::to_string(metadata).unwrap_or_default();
            hasher.update(canonical.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A stored chunk: one token window of a document, with its embedding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier (16 hex chars of the chunk content hash).
    pub id: String,

    /// Vector identifier in the ANN index. Monotonic per index,
    /// never reused.
    pub vector_id: u64,

    /// URI of the parent document.
    pub document_uri: String,

    /// Decoded chunk text.
    pub text: String,

    /// Embedding vector; length equals the index dimension.
    pub embedding: Vec<f32>,

    /// 0-based ordinal of this chunk within its document.
    pub position: usize,

    /// Metadata inherited from the parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Options controlling a batch ingest.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchOptions {
    /// Treat every submitted document as changed, skipping the stored-hash
    /// comparison.
    pub force_update: bool,
}

impl BatchOptions {
    /// Returns options that force reprocessing of every document.
    pub fn force() -> Self {
        Self { force_update: true }
    }
}

/// Outcome of a batch ingest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of documents submitted.
    pub total_documents: usize,

    /// Documents with no prior record under their URI.
    pub new_documents: usize,

    /// Documents whose stored hash differed (or force_update was set).
    pub updated_documents: usize,

    /// Documents skipped because their hash matched.
    pub unchanged_documents: usize,

    /// Chunks stored and indexed across all processed documents.
    pub processed_chunks: usize,

    /// Per-document failures, keyed by URI. Failed documents do not abort
    /// the batch.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_uris: BTreeMap<String, String>,
}

/// One ranked hit from a semantic search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    /// The parent document of the matching chunk.
    pub document: Document,

    /// Similarity score in `[0, 1]`; higher is closer.
    pub score: f32,

    /// Identifier of the matching chunk.
    pub chunk_id: String,

    /// Text of the matching chunk.
    pub chunk_text: String,

    /// Name of the index that produced this hit.
    pub index_name: String,
}

/// Statistics for one index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexStats {
    /// Index name.
    pub name: String,

    /// Live document count.
    pub document_count: usize,

    /// Cached chunk count from the last ingest.
    pub chunk_count: usize,

    /// RFC 3339 timestamp of the last metadata update.
    pub last_updated: String,

    /// On-disk size of the index's ANN graph snapshot, in bytes.
    pub size_bytes: u64,
}

/// Pipeline stage reported in a [`ProgressUpdate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    /// Phase A: hash-based change detection.
    Checking,
    /// Phase B: chunking, embedding, and indexing one document.
    Processing,
    /// Embedding a document's chunk batch.
    Embedding,
    /// Phase C: persisting the ANN graph.
    Saving,
    /// The batch finished.
    Complete,
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Checking => "checking",
            Self::Processing => "processing",
            Self::Embedding => "embedding",
            Self::Saving => "saving",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// A progress update emitted during batch ingest.
///
/// Updates are sent over an `std::sync::mpsc` channel supplied by the
/// caller; sends are best-effort and a dropped receiver never fails the
/// batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage.
    pub stage: ProgressStage,

    /// Current item number within the stage.
    pub current: usize,

    /// Total items in the stage.
    pub total: usize,

    /// Human-readable description.
    pub message: String,

    /// URI of the document being worked on, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Cooperative cancellation token for batch ingest.
///
/// Cloning shares the underlying flag. The ingest loop polls the token
/// between documents; in-flight per-document work runs to completion
/// before the token is honored.
///
/// ```rust
/// use semdex::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
