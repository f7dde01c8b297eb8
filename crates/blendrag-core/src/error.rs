use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A per-document index (lexical or vector) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The document was never ingested; raised at the orchestration boundary.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index failed: {0}")]
    VectorIndex(String),

    #[error("Lexical index failed: {0}")]
    Index(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
