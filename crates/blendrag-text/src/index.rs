//! Per-document BM25 lexical index.
//!
//! One tantivy index holds the chunks of exactly one document, so term
//! statistics (IDF, average length) never leak across documents. The index
//! is immutable once built; the searcher and the chunk table are loaded once
//! and shared read-only by concurrent queries.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, instrument};

use blendrag_core::error::{Error, Result};
use blendrag_core::types::{Chunk, ChunkId, Meta};

use crate::tantivy_utils::{analyze, build_analyzer, build_schema, register_tokenizer, FIELD_CHUNK_ID, FIELD_METADATA, FIELD_ORDINAL, FIELD_TEXT};

const WRITER_MEMORY_BYTES: usize = 20_000_000;

/// A chunk with its lexical score for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
	pub chunk_id: ChunkId,
	pub ordinal: usize,
	pub text: String,
	pub metadata: Meta,
	pub score: f32,
	/// Whether any query term or keyword matched the chunk.
	pub matched: bool,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
	chunk_id: ChunkId,
	ordinal: usize,
	text: String,
	metadata: Meta,
	terms: HashSet<String>,
}

#[derive(Clone, Copy)]
struct Fields {
	chunk_id: Field,
	ordinal: Field,
	text: Field,
	metadata: Field,
}

pub struct LexicalIndex {
	document_id: String,
	searcher: Searcher,
	fields: Fields,
	analyzer: TextAnalyzer,
	entries: Vec<IndexedChunk>,
	by_address: HashMap<DocAddress, usize>,
}

fn index_err(e: impl std::fmt::Display) -> Error { Error::Index(e.to_string()) }

impl LexicalIndex {
	/// Builds a fresh index for `document_id`. With `dir`, any previous index in
	/// that directory is replaced wholesale; without it the index lives in RAM.
	#[instrument(skip_all, fields(document_id = %document_id, chunks = chunks.len()))]
	pub fn build(document_id: &str, chunks: &[Chunk], dir: Option<&Path>) -> Result<Self> {
		let schema = build_schema();
		let index = match dir {
			Some(dir) => {
				if dir.exists() { std::fs::remove_dir_all(dir).map_err(index_err)?; }
				std::fs::create_dir_all(dir).map_err(index_err)?;
				Index::create_in_dir(dir, schema.clone()).map_err(index_err)?
			}
			None => Index::create_in_ram(schema.clone()),
		};
		register_tokenizer(&index);
		let fields = Self::fields(&index)?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES).map_err(index_err)?;
		for c in chunks {
			let metadata = serde_json::to_string(&c.metadata).map_err(index_err)?;
			writer.add_document(doc!(
				fields.chunk_id => c.id.clone(),
				fields.ordinal => c.ordinal as u64,
				fields.text => c.text.clone(),
				fields.metadata => metadata,
			)).map_err(index_err)?;
		}
		writer.commit().map_err(index_err)?;
		debug!("lexical index committed");
		Self::from_index(document_id, index)
	}

	/// Opens a previously built on-disk index. A directory without a committed
	/// index is reported as `NotFound`.
	pub fn open(document_id: &str, dir: &Path) -> Result<Self> {
		if !dir.join("meta.json").exists() {
			return Err(Error::NotFound(format!("lexical index for document '{document_id}'")));
		}
		let index = Index::open_in_dir(dir).map_err(index_err)?;
		register_tokenizer(&index);
		Self::from_index(document_id, index)
	}

	fn fields(index: &Index) -> Result<Fields> {
		let schema = index.schema();
		Ok(Fields {
			chunk_id: schema.get_field(FIELD_CHUNK_ID).map_err(index_err)?,
			ordinal: schema.get_field(FIELD_ORDINAL).map_err(index_err)?,
			text: schema.get_field(FIELD_TEXT).map_err(index_err)?,
			metadata: schema.get_field(FIELD_METADATA).map_err(index_err)?,
		})
	}

	fn from_index(document_id: &str, index: Index) -> Result<Self> {
		let fields = Self::fields(&index)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		let searcher = reader.searcher();
		let analyzer = build_analyzer();

		let addresses = searcher.search(&AllQuery, &DocSetCollector).map_err(index_err)?;
		let mut loaded: Vec<(DocAddress, IndexedChunk)> = Vec::with_capacity(addresses.len());
		for addr in addresses {
			let doc: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			let chunk_id = doc.get_first(fields.chunk_id).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let ordinal = doc.get_first(fields.ordinal).and_then(|v| v.as_u64()).unwrap_or_default() as usize;
			let text = doc.get_first(fields.text).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let metadata: Meta = doc.get_first(fields.metadata).and_then(|v| v.as_str()).and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default();
			let terms = analyze(&analyzer, &text).into_iter().collect();
			loaded.push((addr, IndexedChunk { chunk_id, ordinal, text, metadata, terms }));
		}
		loaded.sort_by(|a, b| a.1.ordinal.cmp(&b.1.ordinal).then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id)));

		let by_address = loaded.iter().enumerate().map(|(i, (addr, _))| (*addr, i)).collect();
		let entries = loaded.into_iter().map(|(_, e)| e).collect();
		Ok(Self { document_id: document_id.to_string(), searcher, fields, analyzer, entries, by_address })
	}

	pub fn document_id(&self) -> &str { &self.document_id }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	/// Scores every chunk of the document against `query_text`, adding
	/// `keyword_bonus` per distinct keyword found in the chunk. Results are
	/// sorted by score descending, ties by ordinal, and truncated to `top_k`.
	/// A query with no indexable terms and no keywords matches nothing and
	/// yields an empty list.
	pub fn score(&self, query_text: &str, keywords: &[String], keyword_bonus: f32, top_k: usize) -> Result<Vec<ScoredChunk>> {
		let query_terms: BTreeSet<String> = analyze(&self.analyzer, query_text).into_iter().collect();
		let keyword_terms = self.keyword_terms(keywords);
		if (query_terms.is_empty() && keyword_terms.is_empty()) || self.entries.is_empty() || top_k == 0 {
			return Ok(Vec::new());
		}

		let mut scores = vec![0f32; self.entries.len()];
		let mut matched = vec![false; self.entries.len()];
		if !query_terms.is_empty() {
			let clauses: Vec<(Occur, Box<dyn Query>)> = query_terms
				.iter()
				.map(|t| {
					let term = Term::from_field_text(self.fields.text, t);
					(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
				})
				.collect();
			let query = BooleanQuery::new(clauses);
			let top_docs = self.searcher.search(&query, &TopDocs::with_limit(self.entries.len())).map_err(index_err)?;
			for (score, addr) in top_docs {
				if let Some(&i) = self.by_address.get(&addr) { scores[i] = score; matched[i] = true; }
			}
		}

		if keyword_bonus != 0.0 {
			for (i, entry) in self.entries.iter().enumerate() {
				let overlap = keyword_terms.iter().filter(|kw| kw.iter().all(|t| entry.terms.contains(t))).count();
				if overlap > 0 { scores[i] += keyword_bonus * overlap as f32; matched[i] = true; }
			}
		}

		let mut ranked: Vec<ScoredChunk> = self.entries.iter().enumerate().map(|(i, e)| ScoredChunk {
			chunk_id: e.chunk_id.clone(),
			ordinal: e.ordinal,
			text: e.text.clone(),
			metadata: e.metadata.clone(),
			score: scores[i],
			matched: matched[i],
		}).collect();
		ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.ordinal.cmp(&b.ordinal)));
		ranked.truncate(top_k);
		Ok(ranked)
	}

	/// Each keyword analyzed into its terms; a multi-word keyword matches only
	/// when all of its terms occur in the chunk.
	fn keyword_terms(&self, keywords: &[String]) -> Vec<Vec<String>> {
		let mut out: Vec<Vec<String>> = Vec::new();
		for kw in keywords {
			let terms = analyze(&self.analyzer, kw);
			if !terms.is_empty() && !out.contains(&terms) { out.push(terms); }
		}
		out
	}
}
