//! Domain types shared by the sparse, dense and fusion layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;
pub type DocumentId = String;
pub type Meta = BTreeMap<String, String>;

/// Builds the stable chunk identifier `<document_id>:<ordinal>`.
pub fn chunk_id(document_id: &str, ordinal: usize) -> ChunkId {
    format!("{document_id}:{ordinal}")
}

/// A contiguous slice of a document's extracted text.
///
/// - `id`: globally unique chunk identifier
/// - `document_id`: owning document
/// - `ordinal`: position within the document, unique per document
/// - `text`: the text payload of the chunk
/// - `embedding`: optional precomputed vector of the deployment's dimension
/// - `metadata`: free-form string attributes carried through retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub ordinal: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(document_id: &str, ordinal: usize, text: impl Into<String>) -> Self {
        Self {
            id: chunk_id(document_id, ordinal),
            document_id: document_id.to_string(),
            ordinal,
            text: text.into(),
            embedding: None,
            metadata: Meta::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Indicates which retriever produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Dense,
    Sparse,
}

/// One ranked hit from one retriever for one query variant.
///
/// `score` is retriever-specific and not bounded; higher is better.
/// `source_rank` is 1-based. `ordinal`, `text` and `metadata` ride along so
/// fusion can break ties and emit results without another lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub source_rank: usize,
    pub ordinal: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
    pub source: SourceKind,
}

/// Coarse classification of what a query is asking for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Fact,
    Summary,
    Compare,
    Howto,
    Error,
    Meta,
    #[default]
    Generic,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Fact,
        Intent::Summary,
        Intent::Compare,
        Intent::Howto,
        Intent::Error,
        Intent::Meta,
        Intent::Generic,
    ];

    /// Lenient parse: unknown tags fall back to `Generic`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "fact" => Intent::Fact,
            "summary" => Intent::Summary,
            "compare" => Intent::Compare,
            "howto" | "how-to" | "how_to" => Intent::Howto,
            "error" => Intent::Error,
            "meta" => Intent::Meta,
            _ => Intent::Generic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Fact => "fact",
            Intent::Summary => "summary",
            Intent::Compare => "compare",
            Intent::Howto => "howto",
            Intent::Error => "error",
            Intent::Meta => "meta",
            Intent::Generic => "generic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory dense/sparse weights derived from the query intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightingHint {
    pub dense: f32,
    pub sparse: f32,
}

impl WeightingHint {
    pub const fn new(dense: f32, sparse: f32) -> Self {
        Self { dense, sparse }
    }

    /// Dense share of the total, usable as the weighted-blend `alpha`.
    pub fn alpha(&self) -> f32 {
        let total = self.dense + self.sparse;
        if total <= 0.0 { 0.5 } else { self.dense / total }
    }
}

impl Default for WeightingHint {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// Output of the query refiner for one user request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedQuery {
    pub original: String,
    pub refined_query: String,
    pub sub_queries: Vec<String>,
    pub keywords: Vec<String>,
    pub intent: Intent,
    pub weighting_hint: WeightingHint,
    pub variants: Vec<String>,
}

/// How dense and sparse ranked lists are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FusionStrategy {
    /// RRF when more than one query variant is in play, weighted blend otherwise.
    #[default]
    Auto,
    Weighted,
    Rrf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedChunk {
    pub chunk_id: ChunkId,
    pub fused_score: f32,
    pub ordinal: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

/// Ordered fusion output, best first, at most the requested top-K long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunks: Vec<FusedChunk>,
}

impl FusedResult {
    pub fn new(chunks: Vec<FusedChunk>) -> Self {
        Self { chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk_id.as_str()).collect()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.chunks.first().map(|c| c.fused_score)
    }

    pub fn average_score(&self) -> Option<f32> {
        if self.chunks.is_empty() {
            return None;
        }
        Some(self.chunks.iter().map(|c| c.fused_score).sum::<f32>() / self.chunks.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parse_is_lenient() {
        assert_eq!(Intent::parse(" Compare "), Intent::Compare);
        assert_eq!(Intent::parse("how-to"), Intent::Howto);
        assert_eq!(Intent::parse("banana"), Intent::Generic);
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), intent);
        }
    }

    #[test]
    fn hint_alpha_is_dense_share() {
        assert!((WeightingHint::new(0.4, 0.6).alpha() - 0.4).abs() < 1e-6);
        assert!((WeightingHint::new(0.0, 0.0).alpha() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn chunk_ids_are_document_scoped() {
        let c = Chunk::new("report", 3, "text");
        assert_eq!(c.id, "report:3");
        assert_eq!(c.ordinal, 3);
    }
}
