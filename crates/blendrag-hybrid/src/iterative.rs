//! Bounded refine-and-retry loop.
//!
//! Start -> Retrieve -> Evaluate -> (Accept | Refine -> Retrieve) -> Done.
//! Round one uses the normalized query alone; each later round asks the
//! refiner for a fresh variant set. Once `max_rounds` rounds have run the
//! last result is returned whatever its confidence.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use blendrag_core::config::RetrievalConfig;
use blendrag_core::error::Result;
use blendrag_core::types::FusedResult;

use crate::blended::{BlendedRetriever, RetrievalPlan};

/// Decides whether a round's result is good enough to stop.
pub trait ConfidencePolicy: Send + Sync {
    fn is_confident(&self, result: &FusedResult) -> bool;
}

/// Any non-empty result is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmpty;

impl ConfidencePolicy for NonEmpty {
    fn is_confident(&self, result: &FusedResult) -> bool { !result.is_empty() }
}

/// Accepts a non-empty result whose average fused score reaches the threshold.
#[derive(Debug, Clone, Copy)]
pub struct AverageScoreThreshold(pub f32);

impl ConfidencePolicy for AverageScoreThreshold {
    fn is_confident(&self, result: &FusedResult) -> bool {
        result.average_score().is_some_and(|avg| avg >= self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Start,
    Retrieve,
    Evaluate,
    Refine,
    Done,
}

/// What happened during one iterative retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationTrace {
    pub rounds: usize,
    /// Whether the final round passed the confidence policy.
    pub accepted: bool,
    /// Variant set used in each round, in order.
    pub plans: Vec<RetrievalPlan>,
    pub result: FusedResult,
}

pub struct IterativeRetriever {
    blended: Arc<BlendedRetriever>,
    policy: Arc<dyn ConfidencePolicy>,
    max_rounds: usize,
}

impl IterativeRetriever {
    pub fn new(blended: Arc<BlendedRetriever>) -> Self {
        Self { blended, policy: Arc::new(NonEmpty), max_rounds: 2 }
    }

    /// Rounds and policy from configuration: a `min_average_score` switches to
    /// the threshold policy.
    pub fn with_config(self, config: &RetrievalConfig) -> Self {
        let policy: Arc<dyn ConfidencePolicy> = match config.min_average_score {
            Some(min) => Arc::new(AverageScoreThreshold(min)),
            None => Arc::new(NonEmpty),
        };
        self.with_policy(policy).with_max_rounds(config.max_rounds)
    }

    pub fn with_policy(mut self, policy: Arc<dyn ConfidencePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Zero is treated as one.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn max_rounds(&self) -> usize { self.max_rounds }

    pub fn blended(&self) -> &Arc<BlendedRetriever> { &self.blended }

    pub async fn retrieve_iterative(&self, document_id: &str, query: &str, top_k: usize) -> Result<FusedResult> {
        Ok(self.run(document_id, query, top_k).await?.result)
    }

    /// Validation errors (empty query, unknown document) and retriever
    /// failures propagate; low confidence never does.
    #[instrument(skip(self, query))]
    pub async fn run(&self, document_id: &str, query: &str, top_k: usize) -> Result<IterationTrace> {
        self.blended.check_request(document_id, query).await?;
        let mut trace = IterationTrace::default();
        let mut plan = RetrievalPlan::single(query);
        let mut state = RoundState::Start;
        loop {
            state = match state {
                RoundState::Start => RoundState::Retrieve,
                RoundState::Retrieve => {
                    trace.result = self.blended.retrieve_plan(document_id, &plan, top_k).await?;
                    trace.rounds += 1;
                    trace.plans.push(plan.clone());
                    RoundState::Evaluate
                }
                RoundState::Evaluate => {
                    trace.accepted = self.policy.is_confident(&trace.result);
                    debug!(round = trace.rounds, accepted = trace.accepted, hits = trace.result.len(), "round evaluated");
                    if trace.accepted || trace.rounds >= self.max_rounds { RoundState::Done } else { RoundState::Refine }
                }
                RoundState::Refine => {
                    plan = RetrievalPlan::from(&self.blended.refiner().refine(query).await);
                    RoundState::Retrieve
                }
                RoundState::Done => break,
            };
        }
        info!(rounds = trace.rounds, accepted = trace.accepted, hits = trace.result.len(), "iterative retrieval done");
        Ok(trace)
    }
}
