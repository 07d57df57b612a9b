//! Shared helpers for integration tests.
//!
//! Tests run without a live embedding service: `HashEmbedder` produces
//! deterministic bag-of-words vectors whose cosine similarity tracks
//! token overlap, which is enough to exercise the full ingest and search
//! pipeline end to end.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use semdex::embedding::Embedder;
use semdex::{Config, Document, IndexManager, Result};

/// Embedding dimension used by [`HashEmbedder`].
pub const DIM: usize = 64;

/// Deterministic test embedder: hashes each lowercase whitespace token
/// into a bucket and normalizes the result.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            v[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn generate(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed(text))
    }

    fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Opens a manager over `dir` with the deterministic test embedder.
pub fn open_manager(dir: &std::path::Path) -> IndexManager {
    IndexManager::open_with_embedder(Config::new(dir), Arc::new(HashEmbedder)).unwrap()
}

/// The two-document corpus used by the end-to-end scenarios.
pub fn sample_docs() -> Vec<Document> {
    vec![
        Document::new(
            "doc1",
            "Intro to Go",
            "Go is a statically typed, compiled programming language designed at Google \
             for building simple and reliable software.",
        ),
        Document::new(
            "doc2",
            "Concurrency in Go",
            "Go provides built-in support for concurrent programming with goroutines, \
             channels, and the select statement.",
        ),
    ]
}
