//! Error types for repochat-index.

use crate::document::DocumentError;

/// Errors raised while building or querying the vector index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Loading the repository documents failed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// LLM provider error (embedding).
    #[error("embedding failed: {0}")]
    Llm(#[from] repochat_llm::LlmError),

    /// Nothing to index.
    #[error("no chunks to index")]
    Empty,

    /// A vector did not match the dimension of the index.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding model returned a zero-length vector.
    #[error("embedding provider returned an empty vector")]
    EmptyEmbedding,

    /// Cross-encoder reranker error.
    #[error("rerank failed: {0}")]
    Rerank(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
