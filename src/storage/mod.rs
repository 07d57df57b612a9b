//! Persistent storage layer over [redb](https://docs.rs/redb).
//!
//! A single database file holds every index: a process-wide registry
//! table plus six derived tables per index (see [`schema`]). redb
//! provides ACID transactions with MVCC — concurrent snapshot readers,
//! one writer, durable commit — so multi-key updates (chunk record +
//! doc→chunk mapping + vector mapping) are atomic.
//!
//! # File Layout
//!
//! Opening a store at `<data_path>/indexes.db` creates:
//! - `<data_path>/indexes.db` — the database file
//! - a lock file for writer coordination (managed by redb)

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, TableError, WriteTransaction};
use tracing::{debug, info, instrument};

use crate::error::{NotFoundError, Result, SemdexError, StorageError};
use crate::types::{Chunk, Document};

use schema::{
    bucket_name, encode_vector_key, IndexMetadata, CONFIG_TABLE, INDEXES_TABLE, INDEX_ACTIVE,
    INDEX_BUCKETS, METADATA_KEY,
};

/// Embedded key-value store for documents, chunks, and index metadata.
///
/// All methods take `&self`; redb handles synchronization internally
/// (MVCC readers, exclusive writer).
#[derive(Debug)]
pub struct Storage {
    db: Database,
    path: PathBuf,
}

impl Storage {
    /// Opens or creates the store at the given file path.
    ///
    /// Missing parent directories are created. The process-wide registry
    /// tables are initialized on first open.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file is corrupted or locked by
    /// another process.
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let db = Database::create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::redb("database is locked by another process")
            } else {
                StorageError::from(e)
            }
        })?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(INDEXES_TABLE)?;
            let _ = txn.open_table(CONFIG_TABLE)?;
        }
        txn.commit()?;

        info!("Storage opened");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store. redb flushes durably on commit, so this only
    /// releases the file handles.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        drop(self.db);
        info!("Storage closed");
        Ok(())
    }

    // =========================================================================
    // Index registry
    // =========================================================================

    /// Registers an index and creates its buckets with fresh metadata.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the registry already contains `name`.
    #[instrument(skip(self))]
    pub fn create_index(&self, name: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut registry = txn.open_table(INDEXES_TABLE)?;
            if registry.get(name)?.is_some() {
                return Err(SemdexError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            registry.insert(name, INDEX_ACTIVE)?;
        }
        {
            let documents = bucket_name(name, "documents");
            let _ = txn.open_table(TableDefinition::<&str, &[u8]>::new(&documents))?;
            let chunks = bucket_name(name, "chunks");
            let _ = txn.open_table(TableDefinition::<&str, &[u8]>::new(&chunks))?;
            let doc_chunks = bucket_name(name, "doc_chunks");
            let _ = txn.open_table(TableDefinition::<&str, &[u8]>::new(&doc_chunks))?;
            let hashes = bucket_name(name, "hashes");
            let _ = txn.open_table(TableDefinition::<&str, &str>::new(&hashes))?;
            let vectors = bucket_name(name, "vectors");
            let _ = txn.open_table(TableDefinition::<&[u8], &str>::new(&vectors))?;

            let metadata = bucket_name(name, "metadata");
            let mut table = txn.open_table(TableDefinition::<&str, &[u8]>::new(&metadata))?;
            let bytes = serde_json::to_vec(&IndexMetadata::new())?;
            table.insert(METADATA_KEY, bytes.as_slice())?;
        }
        txn.commit()?;

        info!(index = name, "Index created");
        Ok(())
    }

    /// Removes an index from the registry and drops all of its buckets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the registry does not contain `name`.
    #[instrument(skip(self))]
    pub fn delete_index(&self, name: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut registry = txn.open_table(INDEXES_TABLE)?;
            if registry.remove(name)?.is_none() {
                return Err(NotFoundError::index(name).into());
            }
        }
        for suffix in INDEX_BUCKETS {
            let table = bucket_name(name, suffix);
            // Missing buckets are fine; only the registry entry is authoritative.
            match txn.delete_table(TableDefinition::<&str, &[u8]>::new(&table)) {
                Ok(_) => {}
                Err(TableError::TableDoesNotExist(_)) => {}
                Err(e) => return Err(StorageError::from(e).into()),
            }
        }
        txn.commit()?;

        info!(index = name, "Index deleted");
        Ok(())
    }

    /// Returns true if the registry contains `name`.
    pub fn index_exists(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(INDEXES_TABLE)?;
        Ok(registry.get(name)?.is_some())
    }

    /// Lists all registered index names, in byte order.
    pub fn list_indexes(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(INDEXES_TABLE)?;

        let mut names = Vec::new();
        for entry in registry.iter()? {
            let (key, _) = entry.map_err(StorageError::from)?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Stores (or replaces) a document record.
    ///
    /// When `hash` is a non-empty value, the content hash is written to the
    /// hashes bucket in the same transaction. The ingest pipeline stores the
    /// record with no hash first and writes the hash separately once every
    /// chunk of the document has been stored and indexed.
    pub fn store_document(&self, index: &str, doc: &Document, hash: Option<&str>) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "documents");
            let mut documents = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;
            let bytes = serde_json::to_vec(doc)?;
            documents.insert(doc.uri.as_str(), bytes.as_slice())?;
        }
        if let Some(hash) = hash.filter(|h| !h.is_empty()) {
            let table = bucket_name(index, "hashes");
            let mut hashes = txn.open_table(TableDefinition::<&str, &str>::new(&table))?;
            hashes.insert(doc.uri.as_str(), hash)?;
        }
        txn.commit()?;

        debug!(index, uri = %doc.uri, "Document stored");
        Ok(())
    }

    /// Writes the content hash for a document.
    ///
    /// Called as the final step of processing a document, after all of its
    /// chunks are stored and indexed, so that a mid-pipeline failure leaves
    /// no hash behind and the document is re-triaged on the next ingest.
    pub fn store_document_hash(&self, index: &str, uri: &str, hash: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "hashes");
            let mut hashes = txn.open_table(TableDefinition::<&str, &str>::new(&table))?;
            hashes.insert(uri, hash)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Retrieves a document by URI.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown index or URI.
    pub fn get_document(&self, index: &str, uri: &str) -> Result<Document> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "documents");
        let documents = open_read_table(&txn, &table, index)?;

        match documents.get(uri)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(NotFoundError::document(uri).into()),
        }
    }

    /// Returns true if a document record exists for `uri`.
    pub fn document_exists(&self, index: &str, uri: &str) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "documents");
        let documents = open_read_table(&txn, &table, index)?;
        Ok(documents.get(uri)?.is_some())
    }

    /// Deletes a document record, its hash, and its doc→chunks mapping.
    /// Absent keys are no-ops. Chunk records are removed separately via
    /// [`delete_chunks_by_document`](Self::delete_chunks_by_document).
    pub fn delete_document(&self, index: &str, uri: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "documents");
            let mut documents = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;
            documents.remove(uri)?;
        }
        {
            let table = bucket_name(index, "hashes");
            let mut hashes = txn.open_table(TableDefinition::<&str, &str>::new(&table))?;
            hashes.remove(uri)?;
        }
        {
            let table = bucket_name(index, "doc_chunks");
            let mut mappings = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;
            mappings.remove(uri)?;
        }
        txn.commit()?;

        debug!(index, uri, "Document deleted");
        Ok(())
    }

    /// Lists all document URIs in the index, in byte order.
    pub fn list_documents(&self, index: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "documents");
        let documents = open_read_table(&txn, &table, index)?;

        let mut uris = Vec::new();
        for entry in documents.iter()? {
            let (key, _) = entry.map_err(StorageError::from)?;
            uris.push(key.value().to_string());
        }
        Ok(uris)
    }

    // =========================================================================
    // Chunks
    // =========================================================================

    /// Stores a chunk record, appends it to its document's chunk list, and
    /// records the vector id → chunk id mapping, all in one transaction.
    pub fn store_chunk(&self, index: &str, chunk: &Chunk) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "chunks");
            let mut chunks = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;
            let bytes = serde_json::to_vec(chunk)?;
            chunks.insert(chunk.id.as_str(), bytes.as_slice())?;
        }
        {
            let table = bucket_name(index, "doc_chunks");
            let mut mappings = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;

            let mut chunk_ids: Vec<String> = match mappings.get(chunk.document_uri.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => Vec::new(),
            };
            if !chunk_ids.iter().any(|id| id == &chunk.id) {
                chunk_ids.push(chunk.id.clone());
            }
            let bytes = serde_json::to_vec(&chunk_ids)?;
            mappings.insert(chunk.document_uri.as_str(), bytes.as_slice())?;
        }
        {
            let table = bucket_name(index, "vectors");
            let mut vectors = txn.open_table(TableDefinition::<&[u8], &str>::new(&table))?;
            let key = encode_vector_key(chunk.vector_id);
            vectors.insert(key.as_slice(), chunk.id.as_str())?;
        }
        txn.commit()?;

        debug!(
            index,
            chunk_id = %chunk.id,
            vector_id = chunk.vector_id,
            position = chunk.position,
            "Chunk stored"
        );
        Ok(())
    }

    /// Retrieves a chunk by its identifier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown index or chunk id.
    pub fn get_chunk(&self, index: &str, chunk_id: &str) -> Result<Chunk> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "chunks");
        let chunks = open_read_table(&txn, &table, index)?;

        match chunks.get(chunk_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(NotFoundError::chunk(chunk_id).into()),
        }
    }

    /// Resolves a vector identifier to its chunk, if both the mapping and
    /// the chunk record exist.
    pub fn get_chunk_by_vector(&self, index: &str, vector_id: u64) -> Result<Option<Chunk>> {
        let txn = self.db.begin_read()?;

        let table = bucket_name(index, "vectors");
        let def = TableDefinition::<&[u8], &str>::new(&table);
        let vectors = txn.open_table(def).map_err(|e| bucket_error(e, index))?;

        let key = encode_vector_key(vector_id);
        let chunk_id = match vectors.get(key.as_slice())? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };

        let table = bucket_name(index, "chunks");
        let chunks = open_read_table(&txn, &table, index)?;
        match chunks.get(chunk_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Returns all chunks of a document, sorted by ascending position.
    /// A document with no chunks yields an empty vector.
    pub fn get_chunks_by_document(&self, index: &str, uri: &str) -> Result<Vec<Chunk>> {
        let txn = self.db.begin_read()?;

        let table = bucket_name(index, "doc_chunks");
        let mappings = open_read_table(&txn, &table, index)?;
        let chunk_ids: Vec<String> = match mappings.get(uri)? {
            Some(value) => serde_json::from_slice(value.value())?,
            None => return Ok(Vec::new()),
        };

        let table = bucket_name(index, "chunks");
        let chunks_table = open_read_table(&txn, &table, index)?;

        let mut chunks = Vec::with_capacity(chunk_ids.len());
        for id in &chunk_ids {
            if let Some(value) = chunks_table.get(id.as_str())? {
                let chunk: Chunk = serde_json::from_slice(value.value())?;
                chunks.push(chunk);
            }
        }
        chunks.sort_by_key(|c| c.position);
        Ok(chunks)
    }

    /// Deletes all chunk records of a document, their vector mappings, and
    /// the doc→chunks entry. A document with no chunks is a no-op.
    pub fn delete_chunks_by_document(&self, index: &str, uri: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;

        let mapping_table = bucket_name(index, "doc_chunks");
        let chunk_table = bucket_name(index, "chunks");
        let vector_table = bucket_name(index, "vectors");

        let mut mappings =
            txn.open_table(TableDefinition::<&str, &[u8]>::new(&mapping_table))?;
        let existing: Option<Vec<String>> = {
            match mappings.get(uri)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            }
        };
        let Some(chunk_ids) = existing else {
            drop(mappings);
            txn.commit()?;
            return Ok(());
        };

        {
            let mut chunks = txn.open_table(TableDefinition::<&str, &[u8]>::new(&chunk_table))?;
            let mut vectors = txn.open_table(TableDefinition::<&[u8], &str>::new(&vector_table))?;
            for id in &chunk_ids {
                if let Some(value) = chunks.remove(id.as_str())? {
                    let chunk: Chunk = serde_json::from_slice(value.value())?;
                    let key = encode_vector_key(chunk.vector_id);
                    vectors.remove(key.as_slice())?;
                }
            }
        }
        mappings.remove(uri)?;
        drop(mappings);
        txn.commit()?;

        debug!(index, uri, removed = chunk_ids.len(), "Chunks deleted");
        Ok(())
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    /// Returns the stored content hash for a document URI, if any.
    pub fn get_document_hash(&self, index: &str, uri: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "hashes");
        let def = TableDefinition::<&str, &str>::new(&table);
        let hashes = txn.open_table(def).map_err(|e| bucket_error(e, index))?;
        Ok(hashes.get(uri)?.map(|v| v.value().to_string()))
    }

    /// Removes every entry in the hashes bucket without dropping it.
    ///
    /// Clearing hashes is what makes a rebuild after `clear()` classify all
    /// documents as new again.
    pub fn clear_hashes(&self, index: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "hashes");
            let mut hashes = txn.open_table(TableDefinition::<&str, &str>::new(&table))?;
            let uris: Vec<String> = hashes
                .iter()?
                .map(|entry| {
                    entry
                        .map(|(key, _)| key.value().to_string())
                        .map_err(StorageError::from)
                })
                .collect::<std::result::Result<_, _>>()?;
            for uri in &uris {
                hashes.remove(uri.as_str())?;
            }
        }
        txn.commit()?;

        debug!(index, "Hashes cleared");
        Ok(())
    }

    // =========================================================================
    // Metadata and vector id allocation
    // =========================================================================

    /// Reads the index metadata record.
    pub fn get_index_metadata(&self, index: &str) -> Result<IndexMetadata> {
        let txn = self.db.begin_read()?;
        let table = bucket_name(index, "metadata");
        let metadata = open_read_table(&txn, &table, index)?;

        match metadata.get(METADATA_KEY)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::corrupted(format!(
                "metadata record missing for index '{index}'"
            ))
            .into()),
        }
    }

    /// Replaces the index metadata record.
    pub fn set_index_metadata(&self, index: &str, metadata: &IndexMetadata) -> Result<()> {
        debug!(
            index,
            document_count = metadata.document_count,
            chunk_count = metadata.chunk_count,
            next_vector_id = metadata.next_vector_id,
            "Updating index metadata"
        );

        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        {
            let table = bucket_name(index, "metadata");
            let mut table = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;
            let bytes = serde_json::to_vec(metadata)?;
            table.insert(METADATA_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Atomically allocates the next vector identifier for an index.
    ///
    /// Reads and increments `next_vector_id` within one write transaction
    /// and returns the pre-increment value. Concurrent callers observe
    /// distinct values in commit order.
    pub fn next_vector_id(&self, index: &str) -> Result<u64> {
        let txn = self.db.begin_write()?;
        ensure_registered(&txn, index)?;
        let allocated;
        {
            let table = bucket_name(index, "metadata");
            let mut table = txn.open_table(TableDefinition::<&str, &[u8]>::new(&table))?;

            let mut metadata: IndexMetadata = match table.get(METADATA_KEY)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(StorageError::corrupted(format!(
                        "metadata record missing for index '{index}'"
                    ))
                    .into())
                }
            };

            allocated = metadata.next_vector_id;
            metadata.next_vector_id += 1;

            let bytes = serde_json::to_vec(&metadata)?;
            table.insert(METADATA_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(allocated)
    }
}

/// Fails with `NotFound` when `index` is not in the registry.
///
/// Write transactions create tables on open, so without this guard a write
/// against an unknown index would silently materialize its buckets.
fn ensure_registered(txn: &WriteTransaction, index: &str) -> Result<()> {
    let registry = txn.open_table(INDEXES_TABLE)?;
    if registry.get(index)?.is_none() {
        return Err(NotFoundError::index(index).into());
    }
    Ok(())
}

/// Opens a per-index table for reading, mapping a missing table to
/// `NotFound` for the index.
fn open_read_table(
    txn: &ReadTransaction,
    table: &str,
    index: &str,
) -> Result<redb::ReadOnlyTable<&'static str, &'static [u8]>> {
    txn.open_table(TableDefinition::<&str, &[u8]>::new(table))
        .map_err(|e| bucket_error(e, index))
}

/// Maps a missing-table error to `NotFound` for the index; everything else
/// stays a storage error.
fn bucket_error(err: TableError, index: &str) -> SemdexError {
    match err {
        TableError::TableDoesNotExist(_) => NotFoundError::index(index).into(),
        other => StorageError::from(other).into(),
    }
}
