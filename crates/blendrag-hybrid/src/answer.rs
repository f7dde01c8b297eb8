//! Grounded question answering on top of iterative retrieval.

use std::sync::Arc;

use serde::Serialize;
use tracing::{instrument, warn};

use blendrag_core::config::AnswerConfig;
use blendrag_core::error::Result;
use blendrag_core::traits::Generator;
use blendrag_core::types::FusedChunk;

use crate::context::{build_answer_prompt, merge_blocks, top_sentences};
use crate::iterative::IterativeRetriever;

pub const NO_ANSWER: &str = "No answer could be generated.";
pub const GENERATION_FAILED: &str = "Error generating answer.";
const TABLE_MISSING: &str = "Could not detect a table format in the answer. Original response:\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Generator output before post-processing; empty when generation failed.
    pub raw_answer: String,
    /// Chunks the answer was grounded on, best first.
    pub chunks: Vec<FusedChunk>,
    /// The same chunks merged in document order, for display as sources.
    pub blocks: Vec<String>,
}

/// Empty answers become a fixed message; a request for a table answered
/// without one is flagged while keeping the original text.
pub fn post_process(query: &str, raw_answer: &str) -> String {
    let answer = raw_answer.trim();
    if answer.is_empty() {
        return NO_ANSWER.to_string();
    }
    if query.to_lowercase().contains("table") && !answer.contains('|') {
        return format!("{TABLE_MISSING}{answer}");
    }
    answer.to_string()
}

pub struct AnswerService {
    retriever: Arc<IterativeRetriever>,
    generator: Arc<dyn Generator>,
    config: AnswerConfig,
}

impl AnswerService {
    pub fn new(retriever: Arc<IterativeRetriever>, generator: Arc<dyn Generator>) -> Self {
        Self { retriever, generator, config: AnswerConfig::default() }
    }

    pub fn with_config(mut self, config: AnswerConfig) -> Self {
        self.config = config;
        self
    }

    /// Retrieval errors propagate; a failing generator does not.
    #[instrument(skip(self, query))]
    pub async fn ask(&self, document_id: &str, query: &str, top_k: usize) -> Result<Answer> {
        let result = self.retriever.retrieve_iterative(document_id, query, top_k).await?;
        let chunks: Vec<FusedChunk> = result.chunks.into_iter().take(self.config.context_chunks).collect();
        let snippets: Vec<String> = chunks
            .iter()
            .map(|c| top_sentences(&c.text, query, self.config.sentences_per_chunk))
            .collect();
        let prompt = build_answer_prompt(query, &snippets, self.config.max_context_tokens);

        let (answer, raw_answer) = match self.generator.generate(&prompt, self.config.max_tokens, self.config.temperature).await {
            Ok(raw) => (post_process(query, &raw), raw),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "answer generation failed");
                (GENERATION_FAILED.to_string(), String::new())
            }
        };
        let blocks = merge_blocks(&chunks, self.config.block_words);
        Ok(Answer { answer, raw_answer, chunks, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answers_get_a_fixed_message() {
        assert_eq!(post_process("q", "   \n"), NO_ANSWER);
    }

    #[test]
    fn missing_table_is_flagged() {
        let flagged = post_process("Show a TABLE of prices", "Prices are 3 and 4.");
        assert!(flagged.starts_with("Could not detect a table format"));
        assert!(flagged.ends_with("Prices are 3 and 4."));
        assert_eq!(post_process("show a table", "| a | b |"), "| a | b |");
        assert_eq!(post_process("what is it", " plain "), "plain");
    }
}
