//! Tokenizer and query normalizer.
//!
//! Tokens are lowercase runs of alphanumeric characters. Every function here
//! accepts empty input and returns an empty result for it.

/// Stopwords removed when deriving keywords and stripped query variants.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "in", "for", "to", "of", "by", "with", "as", "that", "this",
];

/// Trim, lowercase and collapse internal whitespace to single spaces.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

/// Lowercase and split on non-alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tokenize and keep only tokens not present in `stopwords`.
pub fn content_tokens<S: AsRef<str>>(text: &str, stopwords: &[S]) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !stopwords.iter().any(|s| s.as_ref() == t))
        .collect()
}

/// Order-preserving de-duplication.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_query("  What IS\tthe   Price?  "), "what is the price?");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(tokenize("Error-code: E42, retry!"), vec!["error", "code", "e42", "retry"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("?!  ...").is_empty());
    }

    #[test]
    fn content_tokens_drop_stopwords() {
        assert_eq!(content_tokens("the price of the plan", DEFAULT_STOPWORDS), vec!["price", "plan"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let v = dedup_preserving_order(vec!["b".to_string(), "a".to_string(), "b".to_string(), String::new()]);
        assert_eq!(v, vec!["b", "a"]);
    }
}
