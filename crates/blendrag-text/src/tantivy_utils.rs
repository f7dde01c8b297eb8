use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, FAST, INDEXED, STORED, STRING};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream};
use tantivy::Index;

pub const ANALYZER_NAME: &str = "chunk_text";

pub const FIELD_CHUNK_ID: &str = "chunk_id";
pub const FIELD_ORDINAL: &str = "ordinal";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_METADATA: &str = "metadata";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(FIELD_CHUNK_ID, STRING | STORED);
	schema_builder.add_u64_field(FIELD_ORDINAL, INDEXED | STORED | FAST);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field(FIELD_TEXT, text_options);
	schema_builder.add_text_field(FIELD_METADATA, STORED);
	schema_builder.build()
}

/// Lowercased alphanumeric runs, stemmed so `cats` and `cat` share a term.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(Stemmer::new(Language::English))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER_NAME, build_analyzer());
}

/// Runs `text` through the analyzer and returns the indexed terms in order.
pub fn analyze(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
	let mut analyzer = analyzer.clone();
	let mut stream = analyzer.token_stream(text);
	let mut terms = Vec::new();
	while stream.advance() { terms.push(stream.token().text.clone()); }
	terms
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyzer_lowercases_splits_and_stems() {
		let analyzer = build_analyzer();
		assert_eq!(analyze(&analyzer, "Cats, and DOGS!"), vec!["cat", "and", "dog"]);
		assert!(analyze(&analyzer, "").is_empty());
		assert!(analyze(&analyzer, " -- ").is_empty());
	}
}
