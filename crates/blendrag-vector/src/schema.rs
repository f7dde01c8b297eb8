use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_DOC_ID: &str = "doc_id";
pub const COL_ORDINAL: &str = "ordinal";
pub const COL_CONTENT: &str = "content";
pub const COL_METADATA: &str = "metadata";
pub const COL_VECTOR: &str = "vector";
/// Distance column LanceDB appends to vector search results.
pub const COL_DISTANCE: &str = "_distance";

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_DOC_ID, DataType::Utf8, false),
		Field::new(COL_ORDINAL, DataType::Int32, false),
		Field::new(COL_CONTENT, DataType::Utf8, false),
		Field::new(COL_METADATA, DataType::Utf8, false),
		Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
