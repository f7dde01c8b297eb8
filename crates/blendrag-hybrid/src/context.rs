//! Turning fused chunks into prompt context.

use std::collections::HashSet;

use blendrag_core::text::tokenize;
use blendrag_core::types::FusedChunk;

/// Rough token estimate used for prompt budgeting.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') && iter.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            let end = i + c.len_utf8();
            out.push(text[start..end].trim());
            start = end;
        }
    }
    out.push(text[start..].trim());
    out.retain(|s| !s.is_empty());
    out
}

/// The `n` sentences of `text` sharing the most tokens with `query`, joined
/// in their original order. Ties keep the earlier sentence.
pub fn top_sentences(text: &str, query: &str, n: usize) -> String {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
    let sentences = split_sentences(text);
    let mut scored: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let terms: HashSet<String> = tokenize(s).into_iter().collect();
            (terms.intersection(&query_terms).count(), i)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let mut keep: Vec<usize> = scored.into_iter().take(n).map(|(_, i)| i).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| sentences[i]).collect::<Vec<_>>().join(" ")
}

/// Merges chunk texts in document (ordinal) order into blocks of at most
/// `max_words` words; a single chunk longer than that becomes its own block.
pub fn merge_blocks(chunks: &[FusedChunk], max_words: usize) -> Vec<String> {
    let mut ordered: Vec<&FusedChunk> = chunks.iter().collect();
    ordered.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.chunk_id.cmp(&b.chunk_id)));

    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;
    for chunk in ordered {
        let words = chunk.text.split_whitespace().count();
        if words == 0 {
            continue;
        }
        if current_words > 0 && current_words + words > max_words {
            blocks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(chunk.text.trim());
        current_words += words;
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Grounded answer prompt. Context pieces are added in the given order until
/// the next one would exceed `max_context_tokens`.
pub fn build_answer_prompt<S: AsRef<str>>(query: &str, contexts: &[S], max_context_tokens: usize) -> String {
    let mut used = 0;
    let mut parts: Vec<&str> = Vec::new();
    for text in contexts {
        let text = text.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        let cost = estimate_tokens(text);
        if used + cost > max_context_tokens {
            break;
        }
        parts.push(text);
        used += cost;
    }
    format!(
        "Answer the question using only the context below.\n\
         If the context does not state the answer directly, summarize what it does say about the question.\n\n\
         Context:\n{}\n\n\
         Question: {}\nAnswer:",
        parts.join("\n\n"),
        query.trim()
    )
}
