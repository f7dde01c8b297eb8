//! Model-free refinement: synonym variants, stopword stripping, cheap
//! keywords and cue-word intent classification.

use std::collections::BTreeMap;

use blendrag_core::text::{content_tokens, dedup_preserving_order, tokenize};
use blendrag_core::types::Intent;

/// One variant per (token, synonym) pair, substituting that token everywhere
/// in the query.
pub fn synonym_variants(query: &str, synonyms: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let tokens = tokenize(query);
    let mut out = Vec::new();
    for tok in dedup_preserving_order(tokens.iter().cloned()) {
        let Some(alternatives) = synonyms.get(&tok) else { continue };
        for alt in alternatives {
            let alt = alt.trim().to_lowercase();
            if alt.is_empty() {
                continue;
            }
            let variant: Vec<&str> = tokens.iter().map(|t| if *t == tok { alt.as_str() } else { t.as_str() }).collect();
            out.push(variant.join(" "));
        }
    }
    out
}

/// The query without stopwords; only when more than one content token remains.
pub fn stripped_variant<S: AsRef<str>>(query: &str, stopwords: &[S]) -> Option<String> {
    let tokens = content_tokens(query, stopwords);
    (tokens.len() > 1).then(|| tokens.join(" "))
}

/// Distinct non-stopword tokens longer than two characters, first `cap` kept.
pub fn cheap_keywords<S: AsRef<str>>(query: &str, stopwords: &[S], cap: usize) -> Vec<String> {
    let mut kws = dedup_preserving_order(content_tokens(query, stopwords).into_iter().filter(|t| t.chars().count() > 2));
    kws.truncate(cap);
    kws
}

const COMPARE_CUES: &[&str] = &["vs", "versus", "compare", "compared", "comparison", "difference", "differences", "differ"];
const HOWTO_CUES: &[&str] = &["steps", "step", "procedure", "install", "configure", "setup"];
const ERROR_CUES: &[&str] = &["error", "errors", "fail", "fails", "failed", "failure", "exception", "crash", "bug"];
const META_CUES: &[&str] = &["page", "pages", "author", "authors", "title", "published", "chapter", "section"];
const FACT_CUES: &[&str] = &["what", "when", "who", "which", "where", "how many", "how much"];

/// Cue-word intent for the fallback path. First matching rule wins.
pub fn classify_intent(query: &str) -> Intent {
    let tokens = tokenize(query);
    let has = |cues: &[&str]| tokens.iter().any(|t| cues.contains(&t.as_str()));
    let joined = tokens.join(" ");

    if has(COMPARE_CUES) {
        return Intent::Compare;
    }
    if tokens.iter().any(|t| t.starts_with("summar") || t == "overview" || t == "tldr") {
        return Intent::Summary;
    }
    if joined.contains("how to") || joined.starts_with("how do") || has(HOWTO_CUES) {
        return Intent::Howto;
    }
    if has(ERROR_CUES) {
        return Intent::Error;
    }
    if has(META_CUES) {
        return Intent::Meta;
    }
    if FACT_CUES.iter().any(|cue| joined.starts_with(cue)) {
        return Intent::Fact;
    }
    Intent::Generic
}
