use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use blendrag_core::error::{Error, Result};
use blendrag_core::traits::{RetrievalQuery, Retriever};
use blendrag_core::types::{Chunk, RetrievalCandidate, SourceKind};

use crate::store::LexicalStore;

pub const DEFAULT_KEYWORD_BONUS: f32 = 0.1;

/// BM25 retriever over per-document lexical indexes.
///
/// A document without an index yields no candidates rather than an error, so
/// fusion can proceed on dense results alone. Every chunk is scored; chunks
/// with no lexical evidence (zero score, no keyword hit) trail in ordinal
/// order. `include_unmatched(false)` drops them instead.
#[derive(Clone)]
pub struct SparseRetriever {
	store: Arc<LexicalStore>,
	keyword_bonus: f32,
	include_unmatched: bool,
}

impl SparseRetriever {
	pub fn new(store: Arc<LexicalStore>) -> Self {
		Self { store, keyword_bonus: DEFAULT_KEYWORD_BONUS, include_unmatched: true }
	}

	pub fn with_keyword_bonus(mut self, bonus: f32) -> Self { self.keyword_bonus = bonus; self }

	pub fn include_unmatched(mut self, include: bool) -> Self { self.include_unmatched = include; self }

	pub fn store(&self) -> &Arc<LexicalStore> { &self.store }

	/// Ingestion side: (re)build the document's index.
	pub fn index(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
		self.store.build(document_id, chunks).map(|_| ())
	}

	/// Scores a document's chunks against `query`.
	#[instrument(skip_all, fields(document_id = %document_id, top_k = top_k))]
	pub fn query(&self, document_id: &str, query: &RetrievalQuery, top_k: usize) -> Result<Vec<RetrievalCandidate>> {
		let index = match self.store.load(document_id) {
			Ok(index) => index,
			Err(e) if e.is_not_found() => {
				warn!(document_id, "no lexical index; sparse results empty");
				return Ok(Vec::new());
			}
			Err(e) => return Err(e),
		};
		let scored = index.score(&query.text, &query.keywords, self.keyword_bonus, if self.include_unmatched { top_k } else { index.len() })?;
		Ok(scored
			.into_iter()
			.filter(|s| self.include_unmatched || s.matched)
			.take(top_k)
			.enumerate()
			.map(|(i, s)| RetrievalCandidate {
				chunk_id: s.chunk_id,
				score: s.score,
				source_rank: i + 1,
				ordinal: s.ordinal,
				text: s.text,
				metadata: s.metadata,
				source: SourceKind::Sparse,
			})
			.collect())
	}
}

#[async_trait]
impl Retriever for SparseRetriever {
	fn kind(&self) -> SourceKind { SourceKind::Sparse }

	async fn retrieve(&self, document_id: &str, query: &RetrievalQuery, top_k: usize) -> Result<Vec<RetrievalCandidate>> {
		let this = self.clone();
		let document_id = document_id.to_string();
		let query = query.clone();
		tokio::task::spawn_blocking(move || this.query(&document_id, &query, top_k))
			.await
			.map_err(|e| Error::Operation(format!("sparse retrieval task failed: {e}")))?
	}

	async fn has_document(&self, document_id: &str) -> Result<bool> {
		self.store.contains(document_id)
	}
}
