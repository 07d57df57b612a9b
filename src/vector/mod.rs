//! Vector index module for HNSW-based approximate nearest-neighbor search.
//!
//! [`HnswIndex`] wraps an `hnsw_rs` graph keyed by caller-supplied 64-bit
//! vector identifiers, with dimension checking, similarity scoring, and a
//! durable snapshot format. One instance exists per named index.

mod hnsw;

pub use hnsw::HnswIndex;
