//! Fusion of dense and sparse rankings into one ordered result.
//!
//! Two strategies are exposed: a weighted blend over min-max normalized
//! scores and Reciprocal Rank Fusion over ranks. Accumulation goes through
//! ordered maps and every sort has a total tie order (score, ordinal, chunk
//! id), so the output depends only on the inputs and never on arrival order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use blendrag_core::types::{ChunkId, FusedChunk, FusedResult, FusionStrategy, Meta, RetrievalCandidate, WeightingHint};

use crate::normalize::min_max;

pub const DEFAULT_ALPHA: f32 = 0.6;
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Dense and sparse candidates retrieved for one query variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantHits {
    pub variant: String,
    pub dense: Vec<RetrievalCandidate>,
    pub sparse: Vec<RetrievalCandidate>,
}

/// One ranked list and its weight for RRF.
#[derive(Debug, Clone, Copy)]
pub struct WeightedList<'a> {
    pub candidates: &'a [RetrievalCandidate],
    pub weight: f32,
}

struct Acc {
    score: f32,
    ordinal: usize,
    text: String,
    metadata: Meta,
}

impl Acc {
    fn from_candidate(c: &RetrievalCandidate) -> Self {
        Self { score: 0.0, ordinal: c.ordinal, text: c.text.clone(), metadata: c.metadata.clone() }
    }
}

fn fused_order(a: &FusedChunk, b: &FusedChunk) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.ordinal.cmp(&b.ordinal))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn into_sorted(acc: BTreeMap<ChunkId, Acc>) -> Vec<FusedChunk> {
    let mut out: Vec<FusedChunk> = acc
        .into_iter()
        .map(|(chunk_id, a)| FusedChunk { chunk_id, fused_score: a.score, ordinal: a.ordinal, text: a.text, metadata: a.metadata })
        .collect();
    out.sort_by(fused_order);
    out
}

/// `alpha * dense_norm + (1 - alpha) * sparse_norm` per chunk, each side
/// normalized on its own; a chunk missing from one side gets 0 from it.
/// `alpha` is clamped to [0, 1].
pub fn weighted_blend(dense: &[RetrievalCandidate], sparse: &[RetrievalCandidate], alpha: f32) -> Vec<FusedChunk> {
    let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { DEFAULT_ALPHA };
    let mut acc: BTreeMap<ChunkId, Acc> = BTreeMap::new();
    for (list, weight) in [(dense, alpha), (sparse, 1.0 - alpha)] {
        let scores: Vec<f32> = list.iter().map(|c| c.score).collect();
        let mut seen = std::collections::HashSet::new();
        for (c, norm) in list.iter().zip(min_max(&scores)) {
            if !seen.insert(c.chunk_id.as_str()) {
                continue;
            }
            acc.entry(c.chunk_id.clone()).or_insert_with(|| Acc::from_candidate(c)).score += weight * norm;
        }
    }
    into_sorted(acc)
}

/// Weighted Reciprocal Rank Fusion: each list adds `weight / (k + rank)` for
/// every chunk it contains, rank being the 1-based position in the list.
/// A chunk repeated within one list counts at its best rank only.
pub fn reciprocal_rank_fusion(lists: &[WeightedList<'_>], k: f32) -> Vec<FusedChunk> {
    let k = if k.is_finite() && k >= 0.0 { k } else { DEFAULT_RRF_K };
    let mut acc: BTreeMap<ChunkId, Acc> = BTreeMap::new();
    for list in lists {
        let mut seen = std::collections::HashSet::new();
        for (i, c) in list.candidates.iter().enumerate() {
            if !seen.insert(c.chunk_id.as_str()) {
                continue;
            }
            let rank = (i + 1) as f32;
            acc.entry(c.chunk_id.clone()).or_insert_with(|| Acc::from_candidate(c)).score += list.weight / (k + rank);
        }
    }
    into_sorted(acc)
}

/// Weighted blend per variant; a chunk keeps its best blended score over all
/// variants.
pub fn blend_variants(variants: &[VariantHits], alpha: f32) -> Vec<FusedChunk> {
    let mut best: BTreeMap<ChunkId, FusedChunk> = BTreeMap::new();
    for v in variants {
        for chunk in weighted_blend(&v.dense, &v.sparse, alpha) {
            match best.get_mut(&chunk.chunk_id) {
                Some(existing) if existing.fused_score >= chunk.fused_score => {}
                Some(existing) => *existing = chunk,
                None => {
                    best.insert(chunk.chunk_id.clone(), chunk);
                }
            }
        }
    }
    let mut out: Vec<FusedChunk> = best.into_values().collect();
    out.sort_by(fused_order);
    out
}

/// Strategy selection plus the blend/RRF parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEngine {
    pub strategy: FusionStrategy,
    pub alpha: f32,
    pub rrf_k: f32,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self { strategy: FusionStrategy::Auto, alpha: DEFAULT_ALPHA, rrf_k: DEFAULT_RRF_K }
    }
}

impl FusionEngine {
    pub fn new(strategy: FusionStrategy, alpha: f32, rrf_k: f32) -> Self {
        Self { strategy, alpha, rrf_k }
    }

    /// `Auto` picks RRF for several variants and the weighted blend for one.
    pub fn resolve(&self, variant_count: usize) -> FusionStrategy {
        match self.strategy {
            FusionStrategy::Auto if variant_count > 1 => FusionStrategy::Rrf,
            FusionStrategy::Auto => FusionStrategy::Weighted,
            s => s,
        }
    }

    /// Fuses every variant's lists and keeps the best `top_k`. The hint, when
    /// given, overrides `alpha` for the blend and supplies per-source RRF
    /// weights; without it RRF weighs every list equally.
    pub fn fuse(&self, variants: &[VariantHits], hint: Option<WeightingHint>, top_k: usize) -> FusedResult {
        let mut chunks = match self.resolve(variants.len()) {
            FusionStrategy::Rrf => {
                let (dense_w, sparse_w) = hint.map_or((1.0, 1.0), |h| (h.dense, h.sparse));
                let lists: Vec<WeightedList<'_>> = variants
                    .iter()
                    .flat_map(|v| {
                        [
                            WeightedList { candidates: &v.dense, weight: dense_w },
                            WeightedList { candidates: &v.sparse, weight: sparse_w },
                        ]
                    })
                    .collect();
                reciprocal_rank_fusion(&lists, self.rrf_k)
            }
            _ => blend_variants(variants, hint.map_or(self.alpha, |h| h.alpha())),
        };
        chunks.truncate(top_k);
        FusedResult::new(chunks)
    }
}
