use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use blendrag_core::error::{Error, Result};
use blendrag_core::traits::{Embedder, RetrievalQuery, Retriever, VectorIndex};
use blendrag_core::types::{RetrievalCandidate, SourceKind};

/// Embedding-similarity retriever. Scores are `1 - cosine distance`, so higher
/// is closer. A document with no vectors yields an empty list.
#[derive(Clone)]
pub struct DenseRetriever {
	embedder: Arc<dyn Embedder>,
	index: Arc<dyn VectorIndex>,
}

impl DenseRetriever {
	pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
		Self { embedder, index }
	}

	pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

	pub fn index(&self) -> &Arc<dyn VectorIndex> { &self.index }

	pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let embedder = self.embedder.clone();
		let text = text.to_string();
		let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
			.await
			.map_err(|e| Error::Operation(format!("embedding task failed: {e}")))?
			.map_err(|e| Error::Embedding(format!("{e:#}")))?;
		if vector.len() != self.embedder.dim() {
			return Err(Error::Embedding(format!("expected {} dims, got {}", self.embedder.dim(), vector.len())));
		}
		Ok(vector)
	}

	/// Nearest chunks of `document_id` to an already computed query vector.
	pub async fn query_embedding(&self, document_id: &str, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalCandidate>> {
		let matches = self.index.query(document_id, embedding, top_k).await.map_err(|e| Error::VectorIndex(format!("{e:#}")))?;
		Ok(matches
			.into_iter()
			.take(top_k)
			.enumerate()
			.map(|(i, m)| RetrievalCandidate {
				chunk_id: m.chunk_id,
				score: 1.0 - m.distance,
				source_rank: i + 1,
				ordinal: m.ordinal,
				text: m.text,
				metadata: m.metadata,
				source: SourceKind::Dense,
			})
			.collect())
	}
}

#[async_trait]
impl Retriever for DenseRetriever {
	fn kind(&self) -> SourceKind { SourceKind::Dense }

	#[instrument(skip_all, fields(document_id = %document_id, top_k = top_k))]
	async fn retrieve(&self, document_id: &str, query: &RetrievalQuery, top_k: usize) -> Result<Vec<RetrievalCandidate>> {
		if top_k == 0 {
			return Ok(Vec::new());
		}
		let embedding = self.embed_query(&query.text).await?;
		let hits = self.query_embedding(document_id, &embedding, top_k).await?;
		debug!(hits = hits.len(), "dense retrieval done");
		Ok(hits)
	}

	async fn has_document(&self, document_id: &str) -> Result<bool> {
		self.index.has_document(document_id).await.map_err(|e| Error::VectorIndex(format!("{e:#}")))
	}
}
