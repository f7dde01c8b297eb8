//! Prompt and output parsing for model-assisted reformulation.

use serde_json::Value;

use super::RefinementError;

pub(crate) fn build_prompt(question: &str) -> String {
    format!(
        "You rewrite questions for a document search engine.\n\
         For the question below return a JSON object with keys:\n\
         - refinedQuery: one precise, faithful reformulation\n\
         - subQueries: 1 to 3 short, non-overlapping sub-questions\n\
         - keywords: 5 to 10 search terms, no stopwords\n\
         - intent: one of fact, summary, compare, howto, error, meta\n\n\
         Question:\n{question}\n\n\
         Respond with the JSON object only."
    )
}

/// What the model returned, before it is merged with heuristic variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Reformulation {
    pub refined_query: String,
    pub sub_queries: Vec<String>,
    pub keywords: Vec<String>,
    pub intent: Option<String>,
}

/// The span from the first `{` to the last `}`.
pub(crate) fn extract_json(raw: &str) -> Result<&str, RefinementError> {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&raw[start..=end]),
        _ => Err(RefinementError::Malformed("no JSON object in model output".into())),
    }
}

fn first_present<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        Some(Value::String(s)) => s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Accepts both camelCase and snake_case keys. A missing or blank refined
/// query makes the whole output malformed.
pub(crate) fn parse_reformulation(raw: &str) -> Result<Reformulation, RefinementError> {
    let value: Value = serde_json::from_str(extract_json(raw)?).map_err(|e| RefinementError::Malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(RefinementError::Malformed("model output is not a JSON object".into()));
    };
    let refined_query = first_present(&obj, &["refinedQuery", "refined_query"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RefinementError::Malformed("missing refinedQuery".into()))?
        .to_string();
    Ok(Reformulation {
        refined_query,
        sub_queries: string_list(first_present(&obj, &["subQueries", "sub_queries"])),
        keywords: string_list(obj.get("keywords")),
        intent: obj.get("intent").and_then(Value::as_str).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_chatter() {
        let raw = "Sure! Here you go:\n```json\n{\"refinedQuery\": \"x\"}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"refinedQuery\": \"x\"}");
        assert!(extract_json("no braces").is_err());
        assert!(extract_json("} backwards {").is_err());
    }

    #[test]
    fn accepts_snake_case_aliases() {
        let r = parse_reformulation(r#"{"refined_query": "cat diet", "sub_queries": ["what cats eat"], "keywords": "cat, diet", "intent": "fact"}"#).unwrap();
        assert_eq!(r.refined_query, "cat diet");
        assert_eq!(r.sub_queries, vec!["what cats eat"]);
        assert_eq!(r.keywords, vec!["cat", "diet"]);
        assert_eq!(r.intent.as_deref(), Some("fact"));
    }

    #[test]
    fn missing_refined_query_is_malformed() {
        assert!(matches!(parse_reformulation(r#"{"keywords": ["a"]}"#), Err(RefinementError::Malformed(_))));
        assert!(matches!(parse_reformulation(r#"{"refinedQuery": "  "}"#), Err(RefinementError::Malformed(_))));
        assert!(matches!(parse_reformulation("{not json}"), Err(RefinementError::Malformed(_))));
    }
}
