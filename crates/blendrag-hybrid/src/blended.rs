use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use blendrag_core::config::RetrievalConfig;
use blendrag_core::error::{Error, Result};
use blendrag_core::text::normalize_query;
use blendrag_core::traits::{RetrievalQuery, Retriever};
use blendrag_core::types::{FusedResult, RefinedQuery, WeightingHint};

use crate::fusion::{FusionEngine, VariantHits};
use crate::refine::QueryRefiner;

/// The query variants, keywords and weighting for one retrieval round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalPlan {
    pub variants: Vec<String>,
    pub keywords: Vec<String>,
    pub hint: Option<WeightingHint>,
}

impl RetrievalPlan {
    /// The normalized query alone, without keywords or a hint.
    pub fn single(query: &str) -> Self {
        Self { variants: vec![normalize_query(query)], keywords: Vec::new(), hint: None }
    }
}

impl From<&RefinedQuery> for RetrievalPlan {
    fn from(q: &RefinedQuery) -> Self {
        Self { variants: q.variants.clone(), keywords: q.keywords.clone(), hint: Some(q.weighting_hint) }
    }
}

/// Runs every query variant through the dense and sparse retrievers
/// concurrently and fuses the lists once all of them are in.
pub struct BlendedRetriever {
    dense: Arc<dyn Retriever>,
    sparse: Arc<dyn Retriever>,
    refiner: Arc<QueryRefiner>,
    fusion: FusionEngine,
    candidates_per_retriever: usize,
}

impl BlendedRetriever {
    pub fn new(dense: Arc<dyn Retriever>, sparse: Arc<dyn Retriever>, refiner: Arc<QueryRefiner>) -> Self {
        Self { dense, sparse, refiner, fusion: FusionEngine::default(), candidates_per_retriever: 20 }
    }

    pub fn with_config(mut self, config: &RetrievalConfig) -> Self {
        self.fusion = FusionEngine::new(config.strategy, config.alpha, config.rrf_k);
        self.candidates_per_retriever = config.candidates_per_retriever;
        self
    }

    pub fn with_fusion(mut self, fusion: FusionEngine) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn refiner(&self) -> &Arc<QueryRefiner> { &self.refiner }

    pub fn fusion(&self) -> &FusionEngine { &self.fusion }

    /// Validates the query and document, optionally refines, then retrieves
    /// and fuses. Absence of matches is an empty result, not an error.
    #[instrument(skip(self, query))]
    pub async fn retrieve(&self, document_id: &str, query: &str, top_k: usize, refine: bool) -> Result<FusedResult> {
        self.check_request(document_id, query).await?;
        let plan = if refine {
            RetrievalPlan::from(&self.refiner.refine(query).await)
        } else {
            RetrievalPlan::single(query)
        };
        self.retrieve_plan(document_id, &plan, top_k).await
    }

    /// Rejects empty queries and documents neither retriever knows.
    pub async fn check_request(&self, document_id: &str, query: &str) -> Result<()> {
        if normalize_query(query).is_empty() {
            return Err(Error::EmptyQuery);
        }
        let (dense, sparse) = tokio::try_join!(self.dense.has_document(document_id), self.sparse.has_document(document_id))?;
        if !dense && !sparse {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }
        Ok(())
    }

    /// One round: all variants against both retrievers, then fusion.
    pub async fn retrieve_plan(&self, document_id: &str, plan: &RetrievalPlan, top_k: usize) -> Result<FusedResult> {
        if top_k == 0 || plan.variants.is_empty() {
            return Ok(FusedResult::default());
        }
        let per_list = self.candidates_per_retriever.max(top_k);
        let hits = try_join_all(plan.variants.iter().map(|variant| self.retrieve_variant(document_id, variant, &plan.keywords, per_list))).await?;
        let fused = self.fusion.fuse(&hits, plan.hint, top_k);
        info!(variants = plan.variants.len(), strategy = ?self.fusion.resolve(plan.variants.len()), fused = fused.len(), "blended retrieval done");
        Ok(fused)
    }

    async fn retrieve_variant(&self, document_id: &str, variant: &str, keywords: &[String], k: usize) -> Result<VariantHits> {
        let query = RetrievalQuery::new(variant).with_keywords(keywords.to_vec());
        let (dense, sparse) = tokio::try_join!(self.dense.retrieve(document_id, &query, k), self.sparse.retrieve(document_id, &query, k))?;
        debug!(variant, dense = dense.len(), sparse = sparse.len(), "variant retrieved");
        Ok(VariantHits { variant: variant.to_string(), dense, sparse })
    }
}
