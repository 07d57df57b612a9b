//! End-to-end ingest and search scenarios through the public API.
//!
//! Exercises the full pipeline — manager, coordinator, chunker, storage,
//! and ANN index — with a deterministic test embedder (no network).

mod common;

use common::{open_manager, sample_docs};
use semdex::{BatchOptions, CancelToken, Document, Metadata};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_create_ingest_search() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();

    let result = index
        .ingest(&sample_docs(), &BatchOptions::default(), None, &CancelToken::new())
        .unwrap();
    assert_eq!(result.total_documents, 2);
    assert_eq!(result.new_documents, 2);
    assert_eq!(result.unchanged_documents, 0);
    assert!(result.processed_chunks >= 2);
    assert!(result.failed_uris.is_empty());

    let hits = index.search("concurrent programming", 5).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].document.uri, "doc2");
    assert_eq!(hits[0].index_name, "docs");
    assert!(hits[0].score > 0.0 && hits[0].score <= 1.0);
    assert!(!hits[0].chunk_id.is_empty());
    assert!(!hits[0].chunk_text.is_empty());

    // Scores are non-increasing along the ranking
    for w in hits.windows(2) {
        assert!(w[0].score >= w[1].score);
    }

    manager.close().unwrap();
}

#[test]
fn test_uri_change_detection() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();
    let token = CancelToken::new();

    let original = vec![Document::new("http://e.com/d", "T", "C")];
    let first = index
        .ingest(&original, &BatchOptions::default(), None, &token)
        .unwrap();
    assert_eq!(first.new_documents, 1);

    let second = index
        .ingest(&original, &BatchOptions::default(), None, &token)
        .unwrap();
    assert_eq!(second.unchanged_documents, 1);

    // A new URI has no stored hash, so the same content is a new document.
    let moved = vec![Document::new("https://e.com/new/d", "T", "C")];
    let third = index
        .ingest(&moved, &BatchOptions::default(), None, &token)
        .unwrap();
    assert_eq!(third.new_documents, 1);
    assert_eq!(third.unchanged_documents, 0);

    manager.close().unwrap();
}

#[test]
fn test_clear_rebuilds_from_scratch() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();
    let token = CancelToken::new();

    index
        .ingest(&sample_docs(), &BatchOptions::default(), None, &token)
        .unwrap();
    index.clear().unwrap();

    let result = index
        .ingest(&sample_docs(), &BatchOptions::default(), None, &token)
        .unwrap();
    assert_eq!(result.new_documents, 2);
    assert_eq!(result.updated_documents, 0);
    assert_eq!(result.unchanged_documents, 0);

    manager.close().unwrap();
}

#[test]
fn test_force_update() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();
    let token = CancelToken::new();
    let docs = vec![Document::new("u", "T", "C")];

    index.ingest(&docs, &BatchOptions::default(), None, &token).unwrap();

    let unchanged = index
        .ingest(&docs, &BatchOptions::default(), None, &token)
        .unwrap();
    assert_eq!(unchanged.unchanged_documents, 1);

    let forced = index
        .ingest(&docs, &BatchOptions::force(), None, &token)
        .unwrap();
    assert_eq!(forced.updated_documents, 1);
    assert_eq!(forced.unchanged_documents, 0);
    assert!(forced.processed_chunks > 0);

    manager.close().unwrap();
}

#[test]
fn test_metadata_change_triggers_update() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();
    let token = CancelToken::new();

    let mut meta = Metadata::new();
    meta.insert("version".to_string(), json!(1));
    let v1 = vec![Document::new("u", "T", "C").with_metadata(meta.clone())];
    index.ingest(&v1, &BatchOptions::default(), None, &token).unwrap();

    // Same metadata: unchanged
    let again = index.ingest(&v1, &BatchOptions::default(), None, &token).unwrap();
    assert_eq!(again.unchanged_documents, 1);

    // Changed metadata: updated
    meta.insert("version".to_string(), json!(2));
    let v2 = vec![Document::new("u", "T", "C").with_metadata(meta)];
    let result = index.ingest(&v2, &BatchOptions::default(), None, &token).unwrap();
    assert_eq!(result.updated_documents, 1);

    manager.close().unwrap();
}

#[test]
fn test_chunk_metadata_inherited_from_document() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();

    let mut meta = Metadata::new();
    meta.insert("lang".to_string(), json!("en"));
    meta.insert("tags".to_string(), json!(["go", "concurrency"]));
    let docs = vec![Document::new("u", "T", "goroutines and channels").with_metadata(meta.clone())];

    index
        .ingest(&docs, &BatchOptions::default(), None, &CancelToken::new())
        .unwrap();

    let hits = index.search("goroutines channels", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.metadata, Some(meta));

    manager.close().unwrap();
}

#[test]
fn test_search_empty_index_returns_no_hits() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let index = manager.create_index("docs").unwrap();

    let hits = index.search("anything at all", 10).unwrap();
    assert!(hits.is_empty());

    manager.close().unwrap();
}

#[test]
fn test_multiple_indexes_are_isolated() {
    let dir = tempdir().unwrap();
    let manager = open_manager(dir.path());
    let token = CancelToken::new();

    let go_docs = manager.create_index("go").unwrap();
    let db_docs = manager.create_index("db").unwrap();

    go_docs
        .ingest(&sample_docs(), &BatchOptions::default(), None, &token)
        .unwrap();
    db_docs
        .ingest(
            &[Document::new(
                "pg",
                "Postgres",
                "Relational databases store rows in tables with transactions.",
            )],
            &BatchOptions::default(),
            None,
            &token,
        )
        .unwrap();

    let hits = db_docs.search("concurrent programming goroutines", 5).unwrap();
    assert!(hits.iter().all(|h| h.index_name == "db"));
    assert!(hits.iter().all(|h| h.document.uri == "pg"));

    let hits = go_docs.search("relational databases tables", 5).unwrap();
    assert!(hits.iter().all(|h| h.document.uri != "pg"));

    manager.close().unwrap();
}
