use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::{debug, info, instrument};

use blendrag_core::traits::{VectorIndex, VectorMatch};
use blendrag_core::types::{Chunk, Meta};

use crate::schema::{build_arrow_schema, COL_CONTENT, COL_DISTANCE, COL_DOC_ID, COL_ID, COL_METADATA, COL_ORDINAL};
use crate::table::{ensure_table, open_db, sql_literal, table_exists};

const INSERT_BATCH: usize = 1000;

/// Chunk embeddings of every document in one LanceDB table, searched by
/// cosine distance with a `doc_id` prefilter.
pub struct LanceVectorIndex {
	db: Connection,
	table_name: String,
	dim: usize,
}

impl LanceVectorIndex {
	pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		ensure!(dim > 0, "vector dimension must be positive");
		let db = open_db(uri).await?;
		ensure_table(&db, table_name, build_arrow_schema(dim as i32)).await?;
		info!(uri, table = table_name, dim, "vector table ready");
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	pub fn dim(&self) -> usize { self.dim }

	async fn table(&self) -> Result<Option<Table>> {
		if !table_exists(&self.db, &self.table_name).await? {
			return Ok(None);
		}
		Ok(Some(self.db.open_table(&self.table_name).execute().await?))
	}

	fn to_record_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let mut ids = Vec::with_capacity(chunks.len());
		let mut doc_ids = Vec::with_capacity(chunks.len());
		let mut ordinals = Vec::with_capacity(chunks.len());
		let mut contents = Vec::with_capacity(chunks.len());
		let mut metadata = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for (chunk, embedding) in chunks.iter().zip(embeddings) {
			ensure!(embedding.len() == self.dim, "embedding for {} has {} dims, table expects {}", chunk.id, embedding.len(), self.dim);
			ids.push(chunk.id.clone());
			doc_ids.push(chunk.document_id.clone());
			ordinals.push(i32::try_from(chunk.ordinal)?);
			contents.push(chunk.text.clone());
			metadata.push(serde_json::to_string(&chunk.metadata)?);
			vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
		}
		Ok(RecordBatch::try_new(build_arrow_schema(self.dim as i32), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(Int32Array::from(ordinals)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
		])?)
	}
}

fn doc_filter(document_id: &str) -> String {
	format!("{} = {}", COL_DOC_ID, sql_literal(document_id))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("column '{name}' missing or mistyped"))
}

fn matches_from_batch(batch: &RecordBatch, out: &mut Vec<VectorMatch>) -> Result<()> {
	let ids = column::<StringArray>(batch, COL_ID)?;
	let doc_ids = column::<StringArray>(batch, COL_DOC_ID)?;
	let ordinals = column::<Int32Array>(batch, COL_ORDINAL)?;
	let contents = column::<StringArray>(batch, COL_CONTENT)?;
	let metadata = column::<StringArray>(batch, COL_METADATA)?;
	let distances = column::<Float32Array>(batch, COL_DISTANCE)?;
	for i in 0..batch.num_rows() {
		let meta: Meta = serde_json::from_str(metadata.value(i)).unwrap_or_default();
		out.push(VectorMatch {
			chunk_id: ids.value(i).to_string(),
			document_id: doc_ids.value(i).to_string(),
			ordinal: ordinals.value(i).max(0) as usize,
			text: contents.value(i).to_string(),
			metadata: meta,
			distance: if distances.is_null(i) { 1.0 } else { distances.value(i) },
		});
	}
	Ok(())
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	#[instrument(skip(self, embedding), fields(table = %self.table_name))]
	async fn query(&self, document_id: &str, embedding: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
		ensure!(embedding.len() == self.dim, "query vector has {} dims, table expects {}", embedding.len(), self.dim);
		let Some(table) = self.table().await? else { return Ok(Vec::new()) };
		if k == 0 {
			return Ok(Vec::new());
		}
		let mut stream = table
			.vector_search(embedding.to_vec())?
			.distance_type(DistanceType::Cosine)
			.only_if(doc_filter(document_id))
			.limit(k)
			.execute()
			.await?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			matches_from_batch(&batch, &mut out)?;
		}
		out.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.ordinal.cmp(&b.ordinal)));
		out.truncate(k);
		debug!(hits = out.len(), "vector search done");
		Ok(out)
	}

	#[instrument(skip_all, fields(table = %self.table_name, chunks = chunks.len()))]
	async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
		ensure!(chunks.len() == embeddings.len(), "chunks and embeddings length must match");
		if chunks.is_empty() {
			return Ok(());
		}
		ensure_table(&self.db, &self.table_name, build_arrow_schema(self.dim as i32)).await?;
		let table = self.db.open_table(&self.table_name).execute().await?;
		for (chunk_batch, emb_batch) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
			let record_batch = self.to_record_batch(chunk_batch, emb_batch)?;
			let schema = record_batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
			// Upsert behavior via merge_insert: chunk id is unique
			let mut mi = table.merge_insert(&[COL_ID]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
		}
		info!("vectors upserted");
		Ok(())
	}

	async fn delete_document(&self, document_id: &str) -> Result<()> {
		if let Some(table) = self.table().await? {
			table.delete(&doc_filter(document_id)).await?;
			info!(document_id, "document vectors deleted");
		}
		Ok(())
	}

	async fn has_document(&self, document_id: &str) -> Result<bool> {
		let Some(table) = self.table().await? else { return Ok(false) };
		Ok(table.count_rows(Some(doc_filter(document_id))).await? > 0)
	}
}
