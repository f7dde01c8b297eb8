use std::sync::Arc;

use tracing::{info, instrument};

use blendrag_core::error::{Error, Result};
use blendrag_core::traits::{Embedder, VectorIndex};
use blendrag_core::types::Chunk;
use blendrag_text::LexicalStore;

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
}

/// Writes a document's chunks into both indexes. Re-ingesting a document
/// replaces its vectors and rebuilds its lexical index wholesale. The lexical
/// index is built before any vector is touched and swapped in last, so a
/// failed text build changes nothing.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorIndex>,
    lexical: Arc<LexicalStore>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, vectors: Arc<dyn VectorIndex>, lexical: Arc<LexicalStore>) -> Self {
        Self { embedder, vectors, lexical }
    }

    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn ingest(&self, document_id: &str, chunks: &[Chunk]) -> Result<IngestReport> {
        if let Some(stray) = chunks.iter().find(|c| c.document_id != document_id) {
            return Err(Error::Operation(format!("chunk {} belongs to document '{}', not '{document_id}'", stray.id, stray.document_id)));
        }

        // 1) embed in batches
        let embedder = self.embedder.clone();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(EMBED_BATCH) {
                out.extend(embedder.embed_batch(batch)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Operation(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        let dim = self.embedder.dim();
        if embeddings.len() != chunks.len() || embeddings.iter().any(|e| e.len() != dim) {
            return Err(Error::Embedding(format!("embedder returned {} vectors of unexpected shape for {} chunks", embeddings.len(), chunks.len())));
        }

        // 2) text index, staged
        let lexical = self.lexical.clone();
        let doc = document_id.to_string();
        let owned = chunks.to_vec();
        let staged = tokio::task::spawn_blocking(move || lexical.stage(&doc, &owned))
            .await
            .map_err(|e| Error::Operation(format!("lexical build task failed: {e}")))??;

        // 3) vector index; an error here drops the staged text index
        self.vectors.delete_document(document_id).await.map_err(|e| Error::VectorIndex(format!("{e:#}")))?;
        self.vectors.upsert(chunks, &embeddings).await.map_err(|e| Error::VectorIndex(format!("{e:#}")))?;

        // 4) publish the text index
        let lexical = self.lexical.clone();
        tokio::task::spawn_blocking(move || lexical.commit(staged).map(|_| ()))
            .await
            .map_err(|e| Error::Operation(format!("lexical commit task failed: {e}")))??;

        info!(document_id, chunks = chunks.len(), "document ingested");
        Ok(IngestReport { chunks: chunks.len() })
    }

    pub async fn delete(&self, document_id: &str) -> Result<()> {
        self.vectors.delete_document(document_id).await.map_err(|e| Error::VectorIndex(format!("{e:#}")))?;
        let lexical = self.lexical.clone();
        let doc = document_id.to_string();
        tokio::task::spawn_blocking(move || lexical.delete(&doc))
            .await
            .map_err(|e| Error::Operation(format!("lexical delete task failed: {e}")))??;
        info!(document_id, "document deleted");
        Ok(())
    }
}
