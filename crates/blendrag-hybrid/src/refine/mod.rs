//! Query refinement.
//!
//! `QueryRefiner::refine` never fails: it tries the model path and, on any
//! `RefinementError`, falls back to the heuristic path. Both paths produce a
//! `RefinedQuery` whose first variant is the normalized original query.

pub mod heuristic;
mod model;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use blendrag_core::config::RefinerConfig;
use blendrag_core::text::{content_tokens, dedup_preserving_order, normalize_query};
use blendrag_core::traits::Generator;
use blendrag_core::types::{Intent, RefinedQuery};

use heuristic::{cheap_keywords, classify_intent, stripped_variant, synonym_variants};

#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("no refinement model configured")]
    Unavailable,

    #[error("refinement model failed: {0}")]
    Generation(String),

    #[error("refinement model timed out after {0:?}")]
    Timeout(Duration),

    #[error("refinement model returned malformed output: {0}")]
    Malformed(String),
}

pub struct QueryRefiner {
    generator: Option<Arc<dyn Generator>>,
    config: RefinerConfig,
}

impl QueryRefiner {
    /// Heuristic-only refiner.
    pub fn new(config: RefinerConfig) -> Self {
        Self { generator: None, config }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &RefinerConfig { &self.config }

    /// Model path first, heuristic on any failure.
    #[instrument(skip_all)]
    pub async fn refine(&self, raw_query: &str) -> RefinedQuery {
        let attempt = self.try_refine_with_model(raw_query).await;
        self.or_heuristic(raw_query, attempt)
    }

    /// The fallback combinator: keeps a successful model refinement, otherwise
    /// logs the cause and substitutes the heuristic refinement.
    pub fn or_heuristic(&self, raw_query: &str, attempt: Result<RefinedQuery, RefinementError>) -> RefinedQuery {
        match attempt {
            Ok(refined) => refined,
            Err(RefinementError::Unavailable) => self.refine_heuristic(raw_query),
            Err(e) => {
                warn!(error = %e, "model refinement failed; using heuristic refinement");
                self.refine_heuristic(raw_query)
            }
        }
    }

    /// Asks the generator for a structured reformulation, bounded by the
    /// configured timeout.
    pub async fn try_refine_with_model(&self, raw_query: &str) -> Result<RefinedQuery, RefinementError> {
        let generator = match &self.generator {
            Some(g) if self.config.use_model => g,
            _ => return Err(RefinementError::Unavailable),
        };
        if normalize_query(raw_query).is_empty() {
            return Err(RefinementError::Malformed("empty query".into()));
        }
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let prompt = model::build_prompt(raw_query.trim());
        let raw = tokio::time::timeout(timeout, generator.generate(&prompt, self.config.max_tokens, self.config.temperature))
            .await
            .map_err(|_| RefinementError::Timeout(timeout))?
            .map_err(|e| RefinementError::Generation(format!("{e:#}")))?;
        let parsed = model::parse_reformulation(&raw)?;
        debug!(refined = %parsed.refined_query, intent = ?parsed.intent, "model refinement parsed");

        let intent = parsed.intent.as_deref().map_or(Intent::Generic, Intent::parse);
        let keywords = dedup_preserving_order(parsed.keywords.iter().map(|k| normalize_query(k)));
        Ok(self.assemble(raw_query, normalize_query(&parsed.refined_query), parsed.sub_queries, keywords, intent))
    }

    /// Normalization, synonym variants, stopword stripping, cheap keywords and
    /// cue-word intent. Needs no collaborator and cannot fail.
    pub fn refine_heuristic(&self, raw_query: &str) -> RefinedQuery {
        let refined = normalize_query(raw_query);
        let content = content_tokens(&refined, &self.config.stopwords);
        let sub_queries = if content.is_empty() { Vec::new() } else { vec![content.join(" ")] };
        let keywords = cheap_keywords(&refined, &self.config.stopwords, self.config.max_keywords);
        let intent = classify_intent(&refined);
        self.assemble(raw_query, refined, sub_queries, keywords, intent)
    }

    fn assemble(&self, raw_query: &str, refined_query: String, sub_queries: Vec<String>, mut keywords: Vec<String>, intent: Intent) -> RefinedQuery {
        let normalized = normalize_query(raw_query);
        let mut sub_queries = dedup_preserving_order(sub_queries.iter().map(|s| normalize_query(s)));
        sub_queries.truncate(self.config.max_sub_queries);
        keywords.truncate(self.config.max_keywords);

        let mut candidates = vec![normalized.clone(), refined_query.clone()];
        candidates.extend(synonym_variants(&refined_query, &self.config.synonyms));
        candidates.extend(stripped_variant(&refined_query, &self.config.stopwords));
        candidates.extend(sub_queries.iter().cloned());
        let mut variants = dedup_preserving_order(candidates);
        if variants.is_empty() {
            variants.push(normalized);
        }

        RefinedQuery {
            original: raw_query.to_string(),
            refined_query,
            sub_queries,
            keywords,
            intent,
            weighting_hint: self.config.weights_for(intent),
            variants,
        }
    }
}
