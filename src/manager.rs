//! Process-wide index manager.
//!
//! Owns the single storage handle plus one [`SearchIndex`] coordinator per
//! registered index. Opening the manager scans the registry and
//! reconstructs every coordinator, loading its graph snapshot from disk
//! (a missing snapshot is normal; an unreadable one leaves the graph
//! empty and is logged, never fatal).

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, RwLock};

use tracing::{info, instrument, warn};

use crate::chunker::Chunker;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{NotFoundError, Result, SemdexError};
use crate::index::SearchIndex;
use crate::storage::Storage;

/// File name of the key-value store inside the data directory.
const STORE_FILE: &str = "indexes.db";

/// Fallback ANN dimension when the embedder's model is unknown and no
/// call has been made yet (nomic-embed-text's dimension).
const DEFAULT_DIMENSION: usize = 768;

/// Manages the set of named indexes backed by one data directory.
///
/// # Thread Safety
///
/// `IndexManager` is `Send + Sync`; share it across threads with `Arc`.
/// Coordinators are handed out as `Arc<SearchIndex>` and stay valid even
/// while other indexes are created or deleted.
pub struct IndexManager {
    config: Config,
    storage: Arc<Storage>,
    embedder: Arc<dyn Embedder>,
    chunker: Arc<Chunker>,
    indexes: RwLock<HashMap<String, Arc<SearchIndex>>>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.indexes.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("IndexManager")
            .field("data_path", &self.config.data_path)
            .field("indexes", &count)
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    /// Opens the manager with the embedding client described by the
    /// configuration.
    ///
    /// Creates the data directory tree, opens the store, and reconstructs
    /// a coordinator for every registered index.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store
    /// cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config)?);
        Self::open_with(config, embedder)
    }

    /// Opens the manager with a custom [`Embedder`] implementation.
    ///
    /// Use this to plug in an embedding provider other than the bundled
    /// HTTP client (a different service, a local model, a test double).
    pub fn open_with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        Self::open_with(config, embedder)
    }

    #[instrument(skip_all, fields(data_path = %config.data_path.display()))]
    fn open_with(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        info!("Opening index manager");

        fs::create_dir_all(&config.data_path)?;
        let storage = Arc::new(Storage::open(config.data_path.join(STORE_FILE))?);
        let chunker = Arc::new(Chunker::new(config.chunk_size, config.chunk_overlap)?);

        let mut indexes = HashMap::new();
        for name in storage.list_indexes()? {
            match Self::build_index(&name, &storage, &embedder, &chunker, &config) {
                Ok(index) => {
                    indexes.insert(name, Arc::new(index));
                }
                Err(e) => {
                    // A coordinator that cannot come up at all (directory
                    // creation, invalid dimension) is a hard failure; graph
                    // snapshot problems are already absorbed below it.
                    warn!(index = %name, error = %e, "Failed to open index");
                    return Err(e);
                }
            }
        }

        info!(indexes = indexes.len(), "Index manager opened");
        Ok(Self {
            config,
            storage,
            embedder,
            chunker,
            indexes: RwLock::new(indexes),
        })
    }

    fn build_index(
        name: &str,
        storage: &Arc<Storage>,
        embedder: &Arc<dyn Embedder>,
        chunker: &Arc<Chunker>,
        config: &Config,
    ) -> Result<SearchIndex> {
        let dimension = match embedder.dimension() {
            0 => DEFAULT_DIMENSION,
            d => d,
        };
        SearchIndex::open(
            name,
            Arc::clone(storage),
            Arc::clone(embedder),
            Arc::clone(chunker),
            config,
            dimension,
        )
    }

    /// Creates a new index.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is already registered.
    #[instrument(skip(self))]
    pub fn create_index(&self, name: &str) -> Result<Arc<SearchIndex>> {
        self.storage.create_index(name)?;

        let index = Arc::new(Self::build_index(
            name,
            &self.storage,
            &self.embedder,
            &self.chunker,
            &self.config,
        )?);

        self.lock_indexes_write()?
            .insert(name.to_string(), Arc::clone(&index));

        info!(index = name, "Index created");
        Ok(index)
    }

    /// Returns the coordinator for an existing index.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name.
    pub fn get_index(&self, name: &str) -> Result<Arc<SearchIndex>> {
        self.lock_indexes_read()?
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::index(name).into())
    }

    /// Deletes an index: registry entry, all buckets, and graph files.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name.
    #[instrument(skip(self))]
    pub fn delete_index(&self, name: &str) -> Result<()> {
        let removed = self
            .lock_indexes_write()?
            .remove(name)
            .ok_or_else(|| SemdexError::from(NotFoundError::index(name)))?;

        self.storage.delete_index(name)?;

        if let Err(e) = removed.remove_graph_files() {
            warn!(index = name, error = %e, "Failed to remove graph files");
        }

        info!(index = name, "Index deleted");
        Ok(())
    }

    /// Lists all registered index names.
    pub fn list_indexes(&self) -> Result<Vec<String>> {
        self.storage.list_indexes()
    }

    /// Closes every coordinator (saving dirty graphs), then the store.
    ///
    /// Consumes the manager; it cannot be used afterwards.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing index manager");

        {
            let indexes = self.lock_indexes_read()?;
            for (name, index) in indexes.iter() {
                if let Err(e) = index.close() {
                    warn!(index = %name, error = %e, "Failed to save graph during close");
                }
            }
        }

        drop(self.indexes);
        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close()?,
            // Outstanding SearchIndex handles still reference the store;
            // redb stays consistent either way since commits are durable.
            Err(_) => warn!("Storage handle still shared at close, skipping explicit close"),
        }

        info!("Index manager closed");
        Ok(())
    }

    fn lock_indexes_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SearchIndex>>>> {
        self.indexes
            .read()
            .map_err(|_| SemdexError::config("index registry lock poisoned"))
    }

    fn lock_indexes_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SearchIndex>>>> {
        self.indexes
            .write()
            .map_err(|_| SemdexError::config("index registry lock poisoned"))
    }
}
