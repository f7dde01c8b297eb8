//! Collaborator seams. Components receive these at construction so tests can
//! swap in doubles; there are no process-wide clients.

use async_trait::async_trait;

use crate::types::{Chunk, ChunkId, DocumentId, Meta, RetrievalCandidate, SourceKind};

/// Text -> vector. Must be deterministic for identical input and return
/// vectors of exactly `dim()` components.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// A nearest-neighbour hit as reported by the vector store. `distance` is the
/// store's metric (cosine distance for the bundled indexes); lower is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub ordinal: usize,
    pub text: String,
    pub metadata: Meta,
    pub distance: f32,
}

/// One logical collection of chunk embeddings across documents, filtered by
/// document at query time.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, document_id: &str, embedding: &[f32], k: usize) -> anyhow::Result<Vec<VectorMatch>>;
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    async fn delete_document(&self, document_id: &str) -> anyhow::Result<()>;
    async fn has_document(&self, document_id: &str) -> anyhow::Result<bool>;
}

/// Language model used for query reformulation and answer generation.
/// Calls may fail or hang; callers bound them with a timeout.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: usize, temperature: f32) -> anyhow::Result<String>;
}

/// A query as seen by a single retriever.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalQuery {
    pub text: String,
    /// Exact-match keywords; only the sparse retriever uses them.
    pub keywords: Vec<String>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), keywords: Vec::new() }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// Shared retriever interface so fusion does not care where candidates came from.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Returns candidates best first, at most `top_k`, with 1-based `source_rank`.
    async fn retrieve(&self, document_id: &str, query: &RetrievalQuery, top_k: usize) -> crate::Result<Vec<RetrievalCandidate>>;

    /// Whether this retriever has anything indexed for the document.
    async fn has_document(&self, document_id: &str) -> crate::Result<bool>;
}
