use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;

use blendrag_core::traits::{VectorIndex, VectorMatch};
use blendrag_core::types::{Chunk, ChunkId, DocumentId};

struct Row {
	chunk: Chunk,
	embedding: Vec<f32>,
}

/// Exact cosine search over vectors held in memory, for tests and small corpora.
#[derive(Default)]
pub struct InMemoryVectorIndex {
	docs: RwLock<BTreeMap<DocumentId, BTreeMap<ChunkId, Row>>>,
}

impl InMemoryVectorIndex {
	pub fn new() -> Self { Self::default() }
}

/// `1 - cos(a, b)`; a zero vector is orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na == 0.0 || nb == 0.0 { return 1.0; }
	1.0 - dot / (na * nb)
}

fn poisoned<T>(_: T) -> anyhow::Error { anyhow!("vector index lock poisoned") }

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
	async fn query(&self, document_id: &str, embedding: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
		let docs = self.docs.read().map_err(poisoned)?;
		let Some(rows) = docs.get(document_id) else { return Ok(Vec::new()) };
		let mut out: Vec<VectorMatch> = rows
			.values()
			.map(|r| VectorMatch {
				chunk_id: r.chunk.id.clone(),
				document_id: r.chunk.document_id.clone(),
				ordinal: r.chunk.ordinal,
				text: r.chunk.text.clone(),
				metadata: r.chunk.metadata.clone(),
				distance: cosine_distance(embedding, &r.embedding),
			})
			.collect();
		out.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.ordinal.cmp(&b.ordinal)));
		out.truncate(k);
		Ok(out)
	}

	async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
		ensure!(chunks.len() == embeddings.len(), "chunks and embeddings length must match");
		let mut docs = self.docs.write().map_err(poisoned)?;
		for (chunk, embedding) in chunks.iter().zip(embeddings) {
			docs.entry(chunk.document_id.clone())
				.or_default()
				.insert(chunk.id.clone(), Row { chunk: chunk.clone(), embedding: embedding.clone() });
		}
		Ok(())
	}

	async fn delete_document(&self, document_id: &str) -> Result<()> {
		self.docs.write().map_err(poisoned)?.remove(document_id);
		Ok(())
	}

	async fn has_document(&self, document_id: &str) -> Result<bool> {
		Ok(self.docs.read().map_err(poisoned)?.get(document_id).is_some_and(|rows| !rows.is_empty()))
	}
}

#[cfg(test)]
mod tests {
	use super::cosine_distance;

	#[test]
	fn cosine_distance_bounds() {
		assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[0.0, 3.0]) - 1.0).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
		assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
	}
}
