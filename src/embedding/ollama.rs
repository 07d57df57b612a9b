//! Ollama-compatible HTTP embedding client.
//!
//! Talks to `POST <base_url>/api/embed` with a blocking client; the engine
//! is synchronous and callers wanting asynchrony run ingest on their own
//! worker threads. Batch requests fan out over a bounded pool of scoped
//! threads while preserving input order in the result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{model_dimension_hint, Embedder};
use crate::error::{Result, SemdexError};

/// Maximum bytes of an error response body surfaced in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Request body for the embed endpoint.
#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Response body from the embed endpoint. Single-text requests use
/// `embeddings[0]`.
#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Stateless embedding client for an Ollama-compatible service.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    /// Frozen on the first successful response when the model is unknown.
    dimension: RwLock<usize>,
    workers: usize,
}

impl std::fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl OllamaEmbedder {
    /// Creates a client for the given service URL and model.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the URL or model is empty, or when the
    /// HTTP client cannot be constructed.
    pub fn new(base_url: &str, model: &str, timeout: Duration, workers: usize) -> Result<Self> {
        if base_url.is_empty() {
            return Err(SemdexError::config("embedding URL cannot be empty"));
        }
        if model.is_empty() {
            return Err(SemdexError::config("embedding model cannot be empty"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SemdexError::config(format!("failed to build HTTP client: {e}")))?;

        let dimension = model_dimension_hint(model);
        if dimension != 0 {
            debug!(model, dimension, "Using known model dimension");
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            dimension: RwLock::new(dimension),
            workers: workers.max(1),
        })
    }

    /// Sends one embed request and extracts the first embedding.
    fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                SemdexError::embedding(format!(
                    "embed request to {url} failed for model '{}': {e}",
                    self.model
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let truncated: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!(status = status.as_u16(), model = %self.model, "Embed request failed");
            return Err(SemdexError::embedding(format!(
                "embed request failed with status {}: {truncated}",
                status.as_u16()
            )));
        }

        let parsed: EmbedResponse = response.json().map_err(|e| {
            SemdexError::embedding(format!("failed to decode embed response: {e}"))
        })?;

        let embedding = parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                SemdexError::embedding(format!(
                    "no embedding returned for model '{}'",
                    self.model
                ))
            })?;

        self.freeze_dimension(embedding.len());

        debug!(
            dimension = embedding.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Embedding generated"
        );
        Ok(embedding)
    }

    /// Records the observed dimension if it was previously unknown.
    fn freeze_dimension(&self, observed: usize) {
        let current = self.dimension.read().map(|d| *d).unwrap_or(0);
        if current == 0 {
            if let Ok(mut dim) = self.dimension.write() {
                if *dim == 0 {
                    *dim = observed;
                    info!(dimension = observed, model = %self.model, "Embedder dimension detected");
                }
            }
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embedding(text)
    }

    /// Embeds every text with a bounded worker pool.
    ///
    /// Workers pull the next input index from a shared cursor and write the
    /// outcome into that index's result slot, so the output order is fully
    /// determined by the input order regardless of completion order. The
    /// error with the smallest input index wins.
    fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let workers = self.workers.min(texts.len());
        info!(count = texts.len(), workers, model = %self.model, "Generating batch embeddings");

        let slots: Vec<Mutex<Option<Result<Vec<f32>>>>> =
            texts.iter().map(|_| Mutex::new(None)).collect();
        let cursor = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let i = cursor.fetch_add(1, Ordering::SeqCst);
                    if i >= texts.len() {
                        break;
                    }
                    let outcome = self.request_embedding(&texts[i]);
                    if let Ok(mut slot) = slots[i].lock() {
                        *slot = Some(outcome);
                    }
                });
            }
        });

        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, slot) in slots.into_iter().enumerate() {
            let outcome = slot
                .into_inner()
                .map_err(|_| SemdexError::embedding("batch result slot poisoned"))?
                .ok_or_else(|| {
                    SemdexError::embedding(format!("no result produced for text {i}"))
                })?;
            match outcome {
                Ok(embedding) => embeddings.push(embedding),
                Err(e) => {
                    return Err(SemdexError::embedding(format!(
                        "failed to generate embedding for text {i}: {e}"
                    )))
                }
            }
        }

        info!(
            count = embeddings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch embedding generation completed"
        );
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension.read().map(|d| *d).unwrap_or(0)
    }
}
