//! Dense retrieval: the LanceDB-backed vector index, an in-memory index with
//! the same contract, and the `DenseRetriever` on top of either.

pub mod dense;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use dense::DenseRetriever;
pub use lance::LanceVectorIndex;
pub use memory::InMemoryVectorIndex;
