//! blendrag-hybrid
//!
//! Blended retrieval: min-max normalization, weighted and reciprocal-rank
//! fusion, query refinement with heuristic fallback, the single-round
//! `BlendedRetriever` and the bounded `IterativeRetriever`. Ingestion and
//! grounded answering sit on top.

pub mod answer;
pub mod blended;
pub mod context;
pub mod engine;
pub mod fusion;
pub mod ingest;
pub mod iterative;
pub mod normalize;
pub mod refine;

pub use answer::{Answer, AnswerService};
pub use blended::{BlendedRetriever, RetrievalPlan};
pub use engine::Engine;
pub use fusion::{FusionEngine, VariantHits};
pub use ingest::{IngestReport, Ingestor};
pub use iterative::{AverageScoreThreshold, ConfidencePolicy, IterationTrace, IterativeRetriever, NonEmpty};
pub use refine::{QueryRefiner, RefinementError};
