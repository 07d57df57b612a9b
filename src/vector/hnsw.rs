//! HNSW vector index implementation using hnsw_rs.
//!
//! Wraps `hnsw_rs::Hnsw` with:
//! - Caller-supplied `u64` vector id ↔ internal `usize` id mapping
//! - Soft-delete via `HashSet` + filtered search
//! - Distance → similarity-score conversion per distance kind
//! - Snapshot persistence (vectors re-inserted in id order on load)
//!
//! # Persistence Strategy
//!
//! `hnsw_rs` graph import borrows from its loader, which creates
//! self-referential struct issues, so the wrapper owns the id → vector
//! association and persists a bincode snapshot of `(id, vector)` pairs.
//! `load()` rebuilds the graph by re-inserting in ascending id order —
//! the original insertion order, since ids are allocated monotonically —
//! which reproduces pre-save search results.
//!
//! # Thread Safety
//!
//! Lock order is state before graph everywhere. Mutations take both
//! write guards; `search` and `len` take read guards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DistanceKind, HnswConfig};
use crate::error::{Result, SemdexError};

/// HNSW vector index backed by `hnsw_rs`.
///
/// Each named index gets its own `HnswIndex` instance, providing complete
/// isolation between indexes.
pub struct HnswIndex {
    /// The underlying graph, replaceable by `clear()` and `load()`.
    graph: RwLock<Graph>,

    /// Mutable id mappings and the owned vector set.
    state: RwLock<IndexState>,

    /// Immutable construction parameters (used to rebuild the graph).
    config: HnswConfig,

    /// Embedding dimension (must match all inserted vectors).
    dimension: usize,

    /// Backing file for snapshots; `None` disables persistence.
    path: Option<PathBuf>,
}

/// The graph variants per distance kind. `hnsw_rs` encodes the distance
/// function in the type, so the two kinds are separate instantiations.
enum Graph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    Euclidean(Hnsw<'static, f32, DistL2>),
}

impl Graph {
    fn new(config: &HnswConfig) -> Self {
        match config.distance {
            DistanceKind::Cosine => Graph::Cosine(Hnsw::new(
                config.m,
                config.max_elements,
                config.max_layer,
                config.ef_construction,
                DistCosine,
            )),
            DistanceKind::Euclidean => Graph::Euclidean(Hnsw::new(
                config.m,
                config.max_elements,
                config.max_layer,
                config.ef_construction,
                DistL2,
            )),
        }
    }

    fn insert(&self, vector: &[f32], internal_id: usize) {
        match self {
            Graph::Cosine(h) => h.insert((vector, internal_id)),
            Graph::Euclidean(h) => h.insert((vector, internal_id)),
        }
    }

    fn parallel_insert(&self, batch: &[(&Vec<f32>, usize)]) {
        match self {
            Graph::Cosine(h) => h.parallel_insert(batch),
            Graph::Euclidean(h) => h.parallel_insert(batch),
        }
    }

    fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<Neighbour> {
        match self {
            Graph::Cosine(h) => h.search(query, k, ef),
            Graph::Euclidean(h) => h.search(query, k, ef),
        }
    }

    fn search_filter(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        filter: Option<&dyn FilterT>,
    ) -> Vec<Neighbour> {
        match self {
            Graph::Cosine(h) => h.search_filter(query, k, ef, filter),
            Graph::Euclidean(h) => h.search_filter(query, k, ef, filter),
        }
    }
}

/// Internal mutable state for id mapping, soft-deletion, and persistence.
struct IndexState {
    /// Forward map: vector id → internal usize id.
    id_to_internal: HashMap<u64, usize>,

    /// Reverse map: internal usize id → vector id (Vec for O(1) lookup).
    internal_to_id: Vec<u64>,

    /// Owned vectors, the source of truth for snapshots and rebuilds.
    vectors: HashMap<u64, Vec<f32>>,

    /// Soft-deleted internal ids, excluded from search.
    deleted: HashSet<usize>,

    /// Next internal id to assign.
    next_internal: usize,

    /// Set by every mutation, cleared by save/load.
    dirty: bool,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            id_to_internal: HashMap::new(),
            internal_to_id: Vec::new(),
            vectors: HashMap::new(),
            deleted: HashSet::new(),
            next_internal: 0,
            dirty: false,
        }
    }

    fn active_count(&self) -> usize {
        self.id_to_internal.len() - self.deleted.len()
    }
}

/// On-disk snapshot format, bincode-encoded.
///
/// Entries are sorted by vector id so a rebuild replays the original
/// insertion order. A truncated or corrupt file fails decoding, which is
/// how torn writes are detected.
#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    dimension: usize,
    distance: DistanceKind,
    entries: Vec<(u64, Vec<f32>)>,
}

impl HnswIndex {
    /// Creates an index, loading an existing snapshot from `path` when one
    /// is present.
    ///
    /// A missing snapshot file is not an error. An unreadable one is logged
    /// and the index starts empty — stored chunks remain the source of
    /// truth and the next ingest repopulates the graph.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `dimension` is zero.
    pub fn new(dimension: usize, config: &HnswConfig, path: Option<PathBuf>) -> Result<Self> {
        if dimension == 0 {
            return Err(SemdexError::config("dimension must be positive"));
        }

        info!(
            dimension,
            m = config.m,
            ef_search = config.ef_search,
            ef_construction = config.ef_construction,
            distance = ?config.distance,
            seed = config.seed,
            path = ?path,
            "Creating HNSW index"
        );

        let index = Self {
            graph: RwLock::new(Graph::new(config)),
            state: RwLock::new(IndexState::empty()),
            config: config.clone(),
            dimension,
            path,
        };

        if let Some(p) = index.path.clone() {
            if p.exists() {
                match index.load() {
                    Ok(()) => debug!(path = %p.display(), "Loaded existing graph snapshot"),
                    Err(e) => warn!(
                        path = %p.display(),
                        error = %e,
                        "Failed to load graph snapshot, starting with an empty graph"
                    ),
                }
            }
        }

        Ok(index)
    }

    /// Embedding dimension this index was constructed with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inserts a vector under the given id.
    ///
    /// Re-inserting an id that is already present is a no-op (ids are
    /// allocated monotonically and never reused).
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vector length differs from the
    /// index dimension.
    pub fn add(&self, vector: &[f32], id: u64) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(SemdexError::dimension(self.dimension, vector.len()));
        }

        let mut state = self.state_write()?;
        if state.id_to_internal.contains_key(&id) {
            return Ok(());
        }

        let internal_id = state.next_internal;
        state.next_internal += 1;
        state.id_to_internal.insert(id, internal_id);
        state.internal_to_id.push(id);
        state.vectors.insert(id, vector.to_vec());
        state.dirty = true;

        let graph = self.graph_write()?;
        graph.insert(vector, internal_id);

        Ok(())
    }

    /// Bulk-inserts vectors under the given ids.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentMismatch` when the slices have different lengths,
    /// or `DimensionMismatch` for the first wrong-length vector.
    pub fn add_batch(&self, vectors: &[Vec<f32>], ids: &[u64]) -> Result<()> {
        if vectors.len() != ids.len() {
            return Err(SemdexError::argument(format!(
                "vectors and ids must have the same length ({} != {})",
                vectors.len(),
                ids.len()
            )));
        }
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(SemdexError::dimension(self.dimension, vector.len()));
            }
        }

        let mut state = self.state_write()?;
        let mut batch: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(vectors.len());
        for (vector, &id) in vectors.iter().zip(ids) {
            if state.id_to_internal.contains_key(&id) {
                continue;
            }
            let internal_id = state.next_internal;
            state.next_internal += 1;
            state.id_to_internal.insert(id, internal_id);
            state.internal_to_id.push(id);
            state.vectors.insert(id, vector.clone());
            batch.push((vector, internal_id));
        }
        if batch.is_empty() {
            return Ok(());
        }
        state.dirty = true;

        let graph = self.graph_write()?;
        graph.parallel_insert(&batch);

        debug!(count = batch.len(), "Batch inserted into HNSW graph");
        Ok(())
    }

    /// Finds up to `k` nearest neighbors of `query`.
    ///
    /// Returns `(vector_id, score)` pairs, nearest first, with scores
    /// monotonically non-increasing. An empty index yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the query length differs from the
    /// index dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension {
            return Err(SemdexError::dimension(self.dimension, query.len()));
        }

        let state = self.state_read()?;
        if state.active_count() == 0 {
            return Ok(Vec::new());
        }

        let graph = self.graph_read()?;
        let ef = self.config.ef_search.max(k);

        // Filtered search excludes soft-deleted entries. The concrete
        // closure auto-implements hnsw_rs::FilterT via the blanket impl.
        let deleted_ref = &state.deleted;
        let filter_fn = |id: &usize| -> bool { !deleted_ref.contains(id) };
        let neighbours = if state.deleted.is_empty() {
            graph.search(query, k, ef)
        } else {
            graph.search_filter(query, k, ef, Some(&filter_fn))
        };

        let results = neighbours
            .into_iter()
            .filter_map(|n| {
                state
                    .internal_to_id
                    .get(n.d_id)
                    .map(|&id| (id, score_from_distance(n.distance, self.config.distance)))
            })
            .collect();

        Ok(results)
    }

    /// Removes a vector from the index. Absent ids are a no-op.
    ///
    /// The entry is excluded from search immediately; the graph node is
    /// dropped at the next save/load cycle.
    pub fn delete(&self, id: u64) -> Result<()> {
        let mut state = self.state_write()?;
        if let Some(&internal_id) = state.id_to_internal.get(&id) {
            if state.deleted.insert(internal_id) {
                state.vectors.remove(&id);
                state.dirty = true;
            }
        }
        Ok(())
    }

    /// Replaces the graph with a fresh one under the same configuration.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state_write()?;
        let mut graph = self.graph_write()?;
        *state = IndexState::empty();
        state.dirty = true;
        *graph = Graph::new(&self.config);

        info!("HNSW index cleared");
        Ok(())
    }

    /// Number of live (non-deleted) vectors.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|s| s.active_count())
            .unwrap_or(0)
    }

    /// Returns true if the index holds no live vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the index has unsaved mutations.
    pub fn is_dirty(&self) -> bool {
        self.state.read().map(|s| s.dirty).unwrap_or(false)
    }

    /// Writes a snapshot to the backing path and clears the dirty flag.
    /// A no-op when no backing path is configured.
    ///
    /// The snapshot is written to a temporary file and renamed into place;
    /// a torn write therefore fails decoding on the next load rather than
    /// silently truncating the graph.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut state = self.state_write()?;

        let mut entries: Vec<(u64, Vec<f32>)> = state
            .vectors
            .iter()
            .map(|(&id, vector)| (id, vector.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);

        let snapshot = GraphSnapshot {
            dimension: self.dimension,
            distance: self.config.distance,
            entries,
        };
        let bytes = bincode::serialize(&snapshot)
            .map_err(|e| SemdexError::vector(format!("failed to encode graph snapshot: {e}")))?;

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = path.with_extension("hnsw.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;

        state.dirty = false;

        info!(
            path = %path.display(),
            vectors = snapshot.entries.len(),
            "HNSW snapshot saved"
        );
        Ok(())
    }

    /// Replaces the in-memory graph with the snapshot at the backing path.
    ///
    /// On any failure (missing file, torn write, dimension mismatch) the
    /// current graph is kept and a `Vector` error is returned; the caller
    /// decides whether that is fatal.
    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Err(SemdexError::vector("no backing path configured for load"));
        };

        let bytes = fs::read(path)
            .map_err(|e| SemdexError::vector(format!("failed to read graph snapshot: {e}")))?;
        let snapshot: GraphSnapshot = bincode::deserialize(&bytes)
            .map_err(|e| SemdexError::vector(format!("failed to decode graph snapshot: {e}")))?;

        if snapshot.dimension != self.dimension {
            return Err(SemdexError::vector(format!(
                "snapshot dimension {} does not match index dimension {}",
                snapshot.dimension, self.dimension
            )));
        }

        let mut entries = snapshot.entries;
        entries.sort_by_key(|(id, _)| *id);

        // Rebuild outside the locks, then swap in.
        let mut fresh = IndexState::empty();
        let graph = Graph::new(&self.config);
        let mut batch: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(entries.len());
        for (id, vector) in &entries {
            let internal_id = fresh.next_internal;
            fresh.next_internal += 1;
            fresh.id_to_internal.insert(*id, internal_id);
            fresh.internal_to_id.push(*id);
            batch.push((vector, internal_id));
        }
        graph.parallel_insert(&batch);
        drop(batch);
        for (id, vector) in entries {
            fresh.vectors.insert(id, vector);
        }

        let mut state = self.state_write()?;
        let mut guard = self.graph_write()?;
        let loaded = fresh.id_to_internal.len();
        *state = fresh;
        *guard = graph;

        info!(path = %path.display(), vectors = loaded, "HNSW snapshot loaded");
        Ok(())
    }

    /// Saves the snapshot if the index is dirty and a backing path is
    /// configured; otherwise a no-op.
    pub fn close(&self) -> Result<()> {
        if self.path.is_some() && self.is_dirty() {
            self.save()?;
        }
        Ok(())
    }

    fn state_read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|_| SemdexError::vector("index state lock poisoned"))
    }

    fn state_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|_| SemdexError::vector("index state lock poisoned"))
    }

    fn graph_read(&self) -> Result<std::sync::RwLockReadGuard<'_, Graph>> {
        self.graph
            .read()
            .map_err(|_| SemdexError::vector("graph lock poisoned"))
    }

    fn graph_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Graph>> {
        self.graph
            .write()
            .map_err(|_| SemdexError::vector("graph lock poisoned"))
    }
}

/// Converts a raw library distance into a similarity score.
///
/// Cosine distance lies in `[0, 2]`, so the score `1 - d/2` lies in
/// `[0, 1]`. Euclidean distance is unbounded, so `1 / (1 + d)` maps it
/// into `(0, 1]`. Both conversions are monotonically decreasing in the
/// distance, preserving the library's nearest-first ordering.
fn score_from_distance(distance: f32, kind: DistanceKind) -> f32 {
    match kind {
        DistanceKind::Cosine => 1.0 - distance / 2.0,
        DistanceKind::Euclidean => 1.0 / (1.0 + distance),
    }
}
