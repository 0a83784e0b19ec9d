use std::path::PathBuf;
use thiserror::Error;

/// Errors raised at the boundaries of the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("failed to extract paragraphs from {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("collection '{collection}' has vector size {actual}, expected {expected}")]
    CollectionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("indexing of '{docid}' stopped after {committed}/{total} paragraphs: {source}")]
    PartialIndex {
        docid: String,
        committed: usize,
        total: usize,
        #[source]
        source: Box<RagError>,
    },

    #[error("search in '{docid}' failed: {source}")]
    Search {
        docid: String,
        #[source]
        source: Box<RagError>,
    },

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type RagResult<T> = std::result::Result<T, RagError>;

impl From<reqwest::Error> for RagError {
    fn from(e: reqwest::Error) -> Self {
        RagError::Llm(e.to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(e: qdrant_client::QdrantError) -> Self {
        RagError::VectorStore(e.to_string())
    }
}
