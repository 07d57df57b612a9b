//! Token-accurate text chunking.
//!
//! Documents are segmented into overlapping windows of `cl100k_base`
//! tokens (the GPT-4 byte-pair encoding). Chunk boundaries are exact token
//! boundaries, so `count_tokens` on a chunk never exceeds the configured
//! window size and consecutive chunks share exactly `overlap_size` tokens.

use sha2::{Digest, Sha256};
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::debug;

use crate::config::MIN_CHUNK_SIZE;
use crate::error::{Result, SemdexError};

/// One token window of a document, before embedding.
///
/// Parent URI and metadata attachment are the coordinator's job; the
/// chunker only segments text and derives chunk identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk identifier: 16 hex chars of `SHA-256(text || "_" || position)`.
    pub id: String,

    /// Decoded chunk text.
    pub text: String,

    /// 0-based ordinal within the source document.
    pub position: usize,
}

/// Splits text into overlapping token windows using `cl100k_base`.
pub struct Chunker {
    chunk_size: usize,
    overlap_size: usize,
    encoder: CoreBPE,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("chunk_size", &self.chunk_size)
            .field("overlap_size", &self.overlap_size)
            .finish_non_exhaustive()
    }
}

impl Chunker {
    /// Creates a chunker with the given window and overlap sizes, in tokens.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `chunk_size` is below 50 tokens or
    /// `overlap_size` is not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap_size: usize) -> Result<Self> {
        if chunk_size < MIN_CHUNK_SIZE {
            return Err(SemdexError::config(
                "chunk size must be at least 50 tokens",
            ));
        }
        if overlap_size >= chunk_size {
            return Err(SemdexError::config(
                "overlap cannot be larger than or equal to chunk size",
            ));
        }

        let encoder = cl100k_base()
            .map_err(|e| SemdexError::config(format!("failed to load cl100k_base encoder: {e}")))?;

        Ok(Self {
            chunk_size,
            overlap_size,
            encoder,
        })
    }

    /// Splits `text` into chunks with overlap.
    ///
    /// Empty input yields no chunks. Input that fits within one window
    /// yields a single chunk carrying the original text verbatim (no
    /// decode round-trip). Longer input is windowed with stride
    /// `chunk_size - overlap_size`; the window that reaches the end of the
    /// token sequence is the last one emitted.
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.encoder.encode_ordinary(text);
        let token_count = tokens.len();

        if token_count <= self.chunk_size {
            debug!(token_count, "Text fits in a single chunk");
            return Ok(vec![Chunk {
                id: chunk_id(text, 0),
                text: text.to_string(),
                position: 0,
            }]);
        }

        let stride = self.chunk_size - self.overlap_size;
        let mut chunks = Vec::with_capacity(token_count / stride + 1);
        let mut position = 0;
        let mut start = 0;

        while start < token_count {
            let end = (start + self.chunk_size).min(token_count);
            let window = tokens[start..end].to_vec();
            let chunk_text = self.encoder.decode(window).map_err(|e| {
                SemdexError::chunking(format!(
                    "failed to decode token window at position {position}: {e}"
                ))
            })?;

            chunks.push(Chunk {
                id: chunk_id(&chunk_text, position),
                text: chunk_text,
                position,
            });
            position += 1;

            if end == token_count {
                break;
            }
            start += stride;
        }

        debug!(
            input_tokens = token_count,
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap_size,
            "Text chunked"
        );

        Ok(chunks)
    }

    /// Returns the number of `cl100k_base` tokens in `text` (0 for empty
    /// input).
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.encoder.encode_ordinary(text).len()
    }

    /// Configured window size in tokens.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap in tokens.
    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }
}

/// Derives a chunk identifier: the first 16 hex characters of
/// `SHA-256(text || "_" || position)`.
///
/// Sixteen hex characters are unique enough within a single index;
/// callers must not rely on uniqueness across indexes.
fn chunk_id(text: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"_");
    hasher.update(position.to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
