//! blendrag-text
//!
//! Sparse retrieval: per-document BM25 indexes on tantivy, a two-tier
//! (memory + disk) store for them, and the `SparseRetriever` over that store.

pub mod tantivy_utils;
pub mod index;
pub mod store;
pub mod sparse;

pub use index::{LexicalIndex, ScoredChunk};
pub use sparse::SparseRetriever;
pub use store::{LexicalStore, StagedIndex};
