//! Repository indexing for retrieval-augmented chat.
//!
//! Loads a cloned repository into [`document::Document`]s, splits them into
//! chunks, embeds every chunk through an [`LlmProvider`](repochat_llm::LlmProvider)
//! and keeps the vectors in a brute-force cosine [`store::VectorIndex`]. Queries are
//! answered by the [`retriever::Retriever`], optionally reordered by a
//! cross-encoder [`rerank::Reranker`].

pub mod builder;
pub mod document;
pub mod error;
pub mod rerank;
pub mod retriever;
pub mod store;

pub use builder::IndexBuilder;
pub use error::{IndexError, Result};
pub use retriever::Retriever;
pub use store::{ScoredChunk, VectorIndex};
