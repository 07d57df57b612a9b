//! Embedding service abstractions.
//!
//! Embeddings are dense vector representations of text used for semantic
//! search. The engine treats the embedding model as an external
//! collaborator behind the [`Embedder`] trait; the bundled implementation
//! is [`OllamaEmbedder`], which talks to an Ollama-compatible HTTP
//! service.
//!
//! # Implementing a Custom Provider
//!
//! ```rust,ignore
//! use semdex::embedding::Embedder;
//! use semdex::Result;
//!
//! struct MyEmbedder {
//!     client: MyApiClient,
//!     dimension: usize,
//! }
//!
//! impl Embedder for MyEmbedder {
//!     fn generate(&self, text: &str) -> Result<Vec<f32>> {
//!         Ok(self.client.embed(text)?)
//!     }
//!
//!     fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
//!         texts.iter().map(|t| self.generate(t)).collect()
//!     }
//!
//!     fn dimension(&self) -> usize {
//!         self.dimension
//!     }
//! }
//! ```
//!
//! Custom providers plug in through `IndexManager::open_with_embedder`.

mod ollama;

pub use ollama::OllamaEmbedder;

use crate::config::Config;
use crate::error::Result;

/// Generates dense vector embeddings for text.
///
/// Implementations must be thread-safe (`Send + Sync`); batch ingest may
/// call them from worker threads.
pub trait Embedder: Send + Sync {
    /// Generates an embedding for a single text.
    fn generate(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// The result at position `i` corresponds to `texts[i]` regardless of
    /// how the implementation schedules the work. On any per-item failure
    /// the whole call fails and no partial results are surfaced.
    fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the vectors this embedder produces, or 0 when not yet
    /// known (unknown model, no call made).
    fn dimension(&self) -> usize;
}

/// Returns the known dimension for a model identifier, or 0 for unknown
/// models (the dimension is then learned from the first response).
///
/// Hints are never authoritative over observed values.
pub fn model_dimension_hint(model: &str) -> usize {
    match model {
        "nomic-embed-text" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "mxbai-embed-large" => 1024,
        "all-minilm" => 384,
        _ => 0,
    }
}

/// Creates the embedder described by the configuration.
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    let embedder = OllamaEmbedder::new(
        &config.embedding_url,
        &config.embedding_model,
        config.http_timeout,
        config.effective_workers(),
    )?;
    Ok(Box::new(embedder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dimension_hints() {
        assert_eq!(model_dimension_hint("nomic-embed-text"), 768);
        assert_eq!(model_dimension_hint("nomic-embed-text-v1"), 768);
        assert_eq!(model_dimension_hint("nomic-embed-text-v1.5"), 768);
        assert_eq!(model_dimension_hint("mxbai-embed-large"), 1024);
        assert_eq!(model_dimension_hint("all-minilm"), 384);
        assert_eq!(model_dimension_hint("some-future-model"), 0);
    }

    #[test]
    fn test_create_embedder_uses_hint() {
        let config = Config::new("./data");
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 768);
    }
}
