//! Per-index coordinator: the ingest pipeline and search.
//!
//! A [`SearchIndex`] pairs one index's persistent records (documents,
//! chunks, hashes, metadata in the KV store) with its in-memory HNSW
//! graph. It is the only component that mutates both: chunk flows write
//! the KV store first and the ANN graph second, so a crash between the
//! two leaves a recoverable ghost chunk rather than an unreferenceable
//! orphan vector.
//!
//! Mutating operations (ingest, delete, clear) are serialized by a
//! per-index lock; reads run concurrently.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::chunker::Chunker;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Result, SemdexError};
use crate::storage::schema::IndexMetadata;
use crate::storage::Storage;
use crate::types::{
    BatchOptions, BatchResult, CancelToken, Chunk, Document, IndexStats, ProgressStage,
    ProgressUpdate, SearchResult,
};
use crate::vector::HnswIndex;

/// One named document index: ingest, search, and single-document
/// operations.
///
/// Obtained from `IndexManager::create_index` or `IndexManager::get_index`.
pub struct SearchIndex {
    name: String,
    storage: Arc<Storage>,
    embedder: Arc<dyn Embedder>,
    chunker: Arc<Chunker>,
    ann: HnswIndex,
    graph_path: PathBuf,
    auto_save: bool,
    /// Serializes ingest/delete/clear against each other.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("name", &self.name)
            .field("vectors", &self.ann.len())
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    /// Builds the coordinator for `name`, creating the graph directory and
    /// loading an existing snapshot when present. An unreadable snapshot
    /// leaves the graph empty (logged inside the ANN wrapper, not fatal).
    pub(crate) fn open(
        name: &str,
        storage: Arc<Storage>,
        embedder: Arc<dyn Embedder>,
        chunker: Arc<Chunker>,
        config: &Config,
        dimension: usize,
    ) -> Result<Self> {
        let graph_dir = config.data_path.join("indexes").join(name);
        fs::create_dir_all(&graph_dir)?;
        let graph_path = graph_dir.join("index.hnsw");

        let ann = HnswIndex::new(dimension, &config.hnsw, Some(graph_path.clone()))?;

        Ok(Self {
            name: name.to_string(),
            storage,
            embedder,
            chunker,
            ann,
            graph_path,
            auto_save: config.auto_save,
            write_lock: Mutex::new(()),
        })
    }

    /// The index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ingests a batch of documents.
    ///
    /// Triage classifies each document as new, updated, or unchanged by
    /// comparing content hashes (`force_update` skips the unchanged
    /// classification). Changed documents are chunked, embedded, and
    /// indexed in submission order. Per-document failures land in
    /// `failed_uris` without aborting the batch.
    ///
    /// `progress` receives best-effort stage updates; `cancel` is polled
    /// between documents, and a cancelled batch returns the work completed
    /// so far (cancellation is not an error).
    #[instrument(skip_all, fields(index = %self.name, documents = docs.len()))]
    pub fn ingest(
        &self,
        docs: &[Document],
        options: &BatchOptions,
        progress: Option<&Sender<ProgressUpdate>>,
        cancel: &CancelToken,
    ) -> Result<BatchResult> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        info!("Starting batch ingest");
        let mut result = BatchResult {
            total_documents: docs.len(),
            ..Default::default()
        };

        // Phase A: triage by content hash.
        let mut queue: Vec<(&Document, String)> = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            let hash = doc.content_hash();
            let stored = self.storage.get_document_hash(&self.name, &doc.uri)?;
            let exists = self.storage.document_exists(&self.name, &doc.uri)?;

            match (stored, exists) {
                (None, false) => {
                    debug!(uri = %doc.uri, "Document is new");
                    result.new_documents += 1;
                    queue.push((doc, hash));
                }
                (Some(prev), _) if !options.force_update && prev == hash => {
                    debug!(uri = %doc.uri, "Document unchanged");
                    result.unchanged_documents += 1;
                }
                _ => {
                    debug!(uri = %doc.uri, "Document updated");
                    result.updated_documents += 1;
                    queue.push((doc, hash));
                }
            }

            emit_progress(
                progress,
                ProgressStage::Checking,
                i + 1,
                docs.len(),
                format!("Checking {}", doc.uri),
                Some(doc.uri.clone()),
            );
        }

        info!(
            new = result.new_documents,
            updated = result.updated_documents,
            unchanged = result.unchanged_documents,
            "Document triage complete"
        );

        if queue.is_empty() {
            emit_progress(
                progress,
                ProgressStage::Complete,
                0,
                0,
                "No documents to process".to_string(),
                None,
            );
            return Ok(result);
        }

        // Phase B: process in submission order. The cancel token is polled
        // at document boundaries; in-flight work runs to completion.
        let enqueued = queue.len();
        let mut processed = 0usize;
        for (doc, hash) in queue {
            if cancel.is_cancelled() {
                info!(processed, enqueued, "Ingest cancelled");
                break;
            }

            match self.process_document(doc, &hash, progress) {
                Ok(chunk_count) => {
                    processed += 1;
                    result.processed_chunks += chunk_count;
                    emit_progress(
                        progress,
                        ProgressStage::Processing,
                        processed,
                        enqueued,
                        format!("Processed {}", doc.uri),
                        Some(doc.uri.clone()),
                    );
                }
                Err(e) => {
                    warn!(uri = %doc.uri, error = %e, "Failed to process document");
                    result.failed_uris.insert(doc.uri.clone(), e.to_string());
                }
            }
        }

        // Phase C: persist the graph and refresh index metadata.
        if self.auto_save {
            emit_progress(
                progress,
                ProgressStage::Saving,
                0,
                0,
                "Saving vector index".to_string(),
                None,
            );
            self.ann.save().map_err(|e| {
                SemdexError::vector(format!(
                    "failed to save graph for index '{}': {e}",
                    self.name
                ))
            })?;
        }

        let mut metadata = self.storage.get_index_metadata(&self.name)?;
        metadata.document_count = self.storage.list_documents(&self.name)?.len();
        metadata.chunk_count = result.processed_chunks;
        metadata.last_updated = Utc::now().to_rfc3339();
        self.storage.set_index_metadata(&self.name, &metadata)?;

        emit_progress(
            progress,
            ProgressStage::Complete,
            processed,
            enqueued,
            format!(
                "Processed {processed} documents ({} chunks)",
                result.processed_chunks
            ),
            None,
        );

        info!(
            processed_chunks = result.processed_chunks,
            failed = result.failed_uris.len(),
            "Batch ingest complete"
        );
        Ok(result)
    }

    /// Runs one document through the pipeline: record, old-chunk cleanup,
    /// chunking, embedding, chunk storage + vector insertion, and finally
    /// the hash write. Returns the number of chunks indexed.
    fn process_document(
        &self,
        doc: &Document,
        hash: &str,
        progress: Option<&Sender<ProgressUpdate>>,
    ) -> Result<usize> {
        debug!(uri = %doc.uri, content_length = doc.content.len(), "Processing document");

        // The record is stored without its hash; the hash is written last,
        // after every chunk is stored and indexed, so a mid-pipeline
        // failure re-triages this URI on the next ingest.
        self.storage.store_document(&self.name, doc, None)?;

        // Drop any previous chunks: graph entries first, then records.
        let existing = self.storage.get_chunks_by_document(&self.name, &doc.uri)?;
        for chunk in &existing {
            self.ann.delete(chunk.vector_id)?;
        }
        self.storage.delete_chunks_by_document(&self.name, &doc.uri)?;

        let pieces = self.chunker.chunk(&doc.content)?;
        if pieces.is_empty() {
            self.storage.store_document_hash(&self.name, &doc.uri, hash)?;
            return Ok(0);
        }

        emit_progress(
            progress,
            ProgressStage::Embedding,
            0,
            pieces.len(),
            format!("Embedding {} chunks of {}", pieces.len(), doc.uri),
            Some(doc.uri.clone()),
        );

        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.generate_batch(&texts)?;
        if embeddings.len() != pieces.len() {
            return Err(SemdexError::embedding(format!(
                "expected {} embeddings for '{}', got {}",
                pieces.len(),
                doc.uri,
                embeddings.len()
            )));
        }

        let mut stored = 0usize;
        for (piece, embedding) in pieces.into_iter().zip(embeddings) {
            let vector_id = self.storage.next_vector_id(&self.name)?;
            let chunk = Chunk {
                id: piece.id,
                vector_id,
                document_uri: doc.uri.clone(),
                text: piece.text,
                embedding: embedding.clone(),
                position: piece.position,
                metadata: doc.metadata.clone(),
            };
            // KV first, graph second.
            self.storage.store_chunk(&self.name, &chunk)?;
            self.ann.add(&embedding, vector_id)?;
            stored += 1;
        }

        self.storage.store_document_hash(&self.name, &doc.uri, hash)?;

        debug!(uri = %doc.uri, chunks = stored, "Document processed");
        Ok(stored)
    }

    /// Searches the index, returning up to `limit` ranked chunk hits with
    /// their parent documents.
    ///
    /// Scores come straight from the ANN wrapper (nearest first,
    /// non-increasing). Hits whose chunk or document no longer resolves
    /// are skipped.
    #[instrument(skip(self), fields(index = %self.name))]
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.generate(query)?;
        let hits = self.ann.search(&embedding, limit)?;

        let mut results = Vec::with_capacity(hits.len());
        for (vector_id, score) in hits {
            let Some(chunk) = self.storage.get_chunk_by_vector(&self.name, vector_id)? else {
                warn!(vector_id, "Search hit has no stored chunk, skipping");
                continue;
            };
            let document = match self.storage.get_document(&self.name, &chunk.document_uri) {
                Ok(doc) => doc,
                Err(e) if e.is_not_found() => {
                    warn!(uri = %chunk.document_uri, "Chunk references a missing document, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            results.push(SearchResult {
                document,
                score,
                chunk_id: chunk.id,
                chunk_text: chunk.text,
                index_name: self.name.clone(),
            });
        }

        debug!(hits = results.len(), "Search complete");
        Ok(results)
    }

    /// Retrieves a document by URI.
    pub fn get_document(&self, uri: &str) -> Result<Document> {
        self.storage.get_document(&self.name, uri)
    }

    /// Deletes a document, its chunks, and their vectors. Absent URIs are
    /// a no-op.
    #[instrument(skip(self), fields(index = %self.name))]
    pub fn delete_document(&self, uri: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let chunks = self.storage.get_chunks_by_document(&self.name, uri)?;
        for chunk in &chunks {
            self.ann.delete(chunk.vector_id)?;
        }
        self.storage.delete_chunks_by_document(&self.name, uri)?;
        self.storage.delete_document(&self.name, uri)?;

        if self.auto_save {
            self.ann.save()?;
        }

        info!(uri, chunks = chunks.len(), "Document deleted");
        Ok(())
    }

    /// Removes every document and chunk, clears the hash bucket (so a
    /// rebuild re-ingests everything), and resets the metadata counters
    /// and vector-id allocator.
    #[instrument(skip(self), fields(index = %self.name))]
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.ann.clear()?;

        for uri in self.storage.list_documents(&self.name)? {
            self.storage.delete_chunks_by_document(&self.name, &uri)?;
            self.storage.delete_document(&self.name, &uri)?;
        }
        self.storage.clear_hashes(&self.name)?;

        let metadata = IndexMetadata {
            next_vector_id: 1,
            document_count: 0,
            chunk_count: 0,
            last_updated: Utc::now().to_rfc3339(),
        };
        self.storage.set_index_metadata(&self.name, &metadata)?;

        if self.auto_save {
            self.ann.save()?;
        }

        info!("Index cleared");
        Ok(())
    }

    /// Returns statistics for this index: live document count, cached
    /// chunk count, last update time, and the on-disk graph snapshot size.
    pub fn stats(&self) -> Result<IndexStats> {
        let metadata = self.storage.get_index_metadata(&self.name)?;
        let document_count = self.storage.list_documents(&self.name)?.len();
        let size_bytes = fs::metadata(&self.graph_path).map(|m| m.len()).unwrap_or(0);

        Ok(IndexStats {
            name: self.name.clone(),
            document_count,
            chunk_count: metadata.chunk_count,
            last_updated: metadata.last_updated,
            size_bytes,
        })
    }

    /// Saves the graph if it has unsaved mutations. Called by the manager
    /// during shutdown.
    pub(crate) fn close(&self) -> Result<()> {
        self.ann.close()
    }

    /// Removes this index's graph files from disk. Called by the manager
    /// after the index is deleted from storage.
    pub(crate) fn remove_graph_files(&self) -> Result<()> {
        if self.graph_path.exists() {
            fs::remove_file(&self.graph_path)?;
        }
        if let Some(dir) = self.graph_path.parent() {
            // Ignore failures: the directory may hold unrelated files.
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }
}

/// Sends a progress update if a channel was supplied. A dropped receiver
/// never fails the batch.
fn emit_progress(
    progress: Option<&Sender<ProgressUpdate>>,
    stage: ProgressStage,
    current: usize,
    total: usize,
    message: String,
    uri: Option<String>,
) {
    if let Some(tx) = progress {
        let _ = tx.send(ProgressUpdate {
            stage,
            current,
            total,
            message,
            uri,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use tempfile::tempdir;

    const DIM: usize = 64;

    /// Deterministic bag-of-words embedder: each lowercase token hashes
    /// into a bucket, and the vector is normalized. Token overlap between
    /// texts produces cosine similarity, which is all these tests need.
    struct HashEmbedder;

    impl HashEmbedder {
        fn embed(text: &str) -> Vec<f32> {
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

    fn setup(dir: &std::path::Path) -> SearchIndex {
        let config = Config::new(dir);
        let storage = Arc::new(Storage::open(dir.join("indexes.db")).unwrap());
        storage.create_index("docs").unwrap();
        let chunker = Arc::new(Chunker::new(config.chunk_size, config.chunk_overlap).unwrap());
        SearchIndex::open("docs", storage, Arc::new(HashEmbedder), chunker, &config, DIM).unwrap()
    }

    fn sample_docs() -> Vec<Document> {
        vec![
            Document::new(
                "doc1",
                "Intro to Go",
                "Go is a statically typed, compiled programming language designed for simplicity.",
            ),
            Document::new(
                "doc2",
                "Concurrency in Go",
                "Go provides built-in support for concurrent programming with goroutines and channels.",
            ),
        ]
    }

    #[test]
    fn test_ingest_then_search_ranks_relevant_document_first() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());

        let result = index
            .ingest(&sample_docs(), &BatchOptions::default(), None, &CancelToken::new())
            .unwrap();
        assert_eq!(result.new_documents, 2);
        assert_eq!(result.unchanged_documents, 0);
        assert!(result.processed_chunks >= 2);
        assert!(result.failed_uris.is_empty());

        let hits = index.search("concurrent programming", 5).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].document.uri, "doc2");
        assert_eq!(hits[0].index_name, "docs");
    }

    #[test]
    fn test_reingest_unchanged_is_noop() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let docs = sample_docs();
        let token = CancelToken::new();

        index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        let second = index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(second.new_documents, 0);
        assert_eq!(second.updated_documents, 0);
        assert_eq!(second.unchanged_documents, 2);
        assert_eq!(second.processed_chunks, 0);
    }

    #[test]
    fn test_changed_content_classified_updated() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let token = CancelToken::new();

        let original = vec![Document::new("u", "T", "original content here")];
        index.ingest(&original, &BatchOptions::default(), None, &token).unwrap();

        let changed = vec![Document::new("u", "T", "completely different content")];
        let result = index.ingest(&changed, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(result.updated_documents, 1);
        assert_eq!(result.new_documents, 0);
    }

    #[test]
    fn test_uri_change_is_new_document() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let token = CancelToken::new();

        let first = vec![Document::new("http://e.com/d", "T", "C")];
        index.ingest(&first, &BatchOptions::default(), None, &token).unwrap();

        let same_uri = index.ingest(&first, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(same_uri.unchanged_documents, 1);

        let moved = vec![Document::new("https://e.com/new/d", "T", "C")];
        let result = index.ingest(&moved, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(result.new_documents, 1);
    }

    #[test]
    fn test_force_update_reprocesses() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let token = CancelToken::new();
        let docs = vec![Document::new("u", "T", "C")];

        index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        let unchanged = index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(unchanged.unchanged_documents, 1);

        let forced = index.ingest(&docs, &BatchOptions::force(), None, &token).unwrap();
        assert_eq!(forced.updated_documents, 1);
        assert_eq!(forced.unchanged_documents, 0);
        assert!(forced.processed_chunks > 0);
    }

    #[test]
    fn test_clear_then_reingest_all_new() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let docs = sample_docs();
        let token = CancelToken::new();

        index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        index.clear().unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.document_count, 0);

        let result = index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();
        assert_eq!(result.new_documents, 2);
        assert_eq!(result.updated_documents, 0);
        assert_eq!(result.unchanged_documents, 0);
    }

    #[test]
    fn test_delete_document_removes_hits() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let token = CancelToken::new();

        index.ingest(&sample_docs(), &BatchOptions::default(), None, &token).unwrap();
        index.delete_document("doc2").unwrap();

        assert!(index.get_document("doc2").unwrap_err().is_not_found());
        let hits = index.search("concurrent programming goroutines", 5).unwrap();
        assert!(hits.iter().all(|h| h.document.uri != "doc2"));

        // Idempotent
        index.delete_document("doc2").unwrap();
    }

    #[test]
    fn test_precancelled_token_processes_nothing() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());

        let token = CancelToken::new();
        token.cancel();

        let result = index
            .ingest(&sample_docs(), &BatchOptions::default(), None, &token)
            .unwrap();
        // Triage still classifies, but nothing is processed.
        assert_eq!(result.new_documents, 2);
        assert_eq!(result.processed_chunks, 0);
        assert!(index.search("concurrent programming", 5).unwrap().is_empty());
    }

    #[test]
    fn test_progress_stages_emitted() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let (tx, rx) = std::sync::mpsc::channel();

        index
            .ingest(&sample_docs(), &BatchOptions::default(), Some(&tx), &CancelToken::new())
            .unwrap();
        drop(tx);

        let updates: Vec<ProgressUpdate> = rx.iter().collect();
        let checking = updates.iter().filter(|u| u.stage == ProgressStage::Checking).count();
        let processing = updates.iter().filter(|u| u.stage == ProgressStage::Processing).count();
        assert_eq!(checking, 2);
        assert_eq!(processing, 2);
        assert_eq!(
            updates.last().map(|u| u.stage),
            Some(ProgressStage::Complete)
        );
    }

    #[test]
    fn test_failed_embedding_recorded_per_document() {
        struct FlakyEmbedder;

        impl Embedder for FlakyEmbedder {
            fn generate(&self, text: &str) -> Result<Vec<f32>> {
                Ok(HashEmbedder::embed(text))
            }

            fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                if texts.iter().any(|t| t.contains("poison")) {
                    return Err(SemdexError::embedding("model exploded"));
                }
                Ok(texts.iter().map(|t| HashEmbedder::embed(t)).collect())
            }

            fn dimension(&self) -> usize {
                DIM
            }
        }

        let dir = tempdir().unwrap();
        let config = Config::new(dir.path());
        let storage = Arc::new(Storage::open(dir.path().join("indexes.db")).unwrap());
        storage.create_index("docs").unwrap();
        let chunker = Arc::new(Chunker::new(config.chunk_size, config.chunk_overlap).unwrap());
        let index = SearchIndex::open(
            "docs",
            storage,
            Arc::new(FlakyEmbedder),
            chunker,
            &config,
            DIM,
        )
        .unwrap();

        let docs = vec![
            Document::new("good", "T", "healthy content"),
            Document::new("bad", "T", "poison content"),
        ];
        let result = index
            .ingest(&docs, &BatchOptions::default(), None, &CancelToken::new())
            .unwrap();

        assert_eq!(result.failed_uris.len(), 1);
        assert!(result.failed_uris.contains_key("bad"));
        assert!(result.processed_chunks > 0, "good document still processed");

        // The failed document was re-triaged as changed on the next pass
        // because its hash was never written.
        let retry = index
            .ingest(&docs, &BatchOptions::default(), None, &CancelToken::new())
            .unwrap();
        assert_eq!(retry.unchanged_documents, 1);
        assert_eq!(retry.updated_documents, 1);
    }

    #[test]
    fn test_stats_reflect_ingest() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());

        index
            .ingest(&sample_docs(), &BatchOptions::default(), None, &CancelToken::new())
            .unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.name, "docs");
        assert_eq!(stats.document_count, 2);
        assert!(stats.chunk_count >= 2);
        assert!(!stats.last_updated.is_empty());
        assert!(stats.size_bytes > 0, "auto_save should have written a snapshot");
    }

    #[test]
    fn test_reingest_updated_document_replaces_chunks() {
        let dir = tempdir().unwrap();
        let index = setup(dir.path());
        let token = CancelToken::new();

        index
            .ingest(
                &[Document::new("u", "T", "the quick brown fox jumps over the lazy dog")],
                &BatchOptions::default(),
                None,
                &token,
            )
            .unwrap();

        index
            .ingest(
                &[Document::new("u", "T", "an entirely rewritten body of text")],
                &BatchOptions::default(),
                None,
                &token,
            )
            .unwrap();

        // Old content no longer matches; the rewritten content does.
        let hits = index.search("entirely rewritten body", 5).unwrap();
        assert_eq!(hits[0].document.uri, "u");
        assert!(hits[0].chunk_text.contains("rewritten"));
    }
}
