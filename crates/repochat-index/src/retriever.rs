//! Semantic retrieval over a built index and context string formatting.

use std::fmt::Write;

use repochat_llm::provider::LlmProvider;

use crate::error::Result;
use crate::store::{ScoredChunk, VectorIndex};

/// Default number of chunks handed to the LLM.
pub const DEFAULT_TOP_K: usize = 4;

/// Embeds queries with the same provider the index was built with and
/// returns the nearest chunks.
#[derive(Debug)]
pub struct Retriever<P: LlmProvider> {
    index: VectorIndex,
    provider: P,
    top_k: usize,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(index: VectorIndex, provider: P, top_k: usize) -> Self {
        Self {
            index,
            provider,
            top_k,
        }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The configured `top_k` chunks most similar to `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query fails or its dimension does not
    /// match the index.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        self.retrieve_n(query, self.top_k).await
    }

    /// Like [`retrieve`](Self::retrieve) with an explicit count.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub async fn retrieve_n(&self, query: &str, n: usize) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.provider.embed(query).await?;
        let hits = self.index.search(&query_vector, n)?;

        for hit in &hits {
            tracing::debug!(
                file = %hit.chunk.metadata.file_path,
                chunk = hit.chunk.chunk_index,
                score = format_args!("{:.3}", hit.score),
                "retrieved"
            );
        }

        Ok(hits)
    }
}

/// Render retrieved chunks as the `{context_str}` block of the prompt.
///
/// Each chunk is introduced by a `file_path: <path>` line; chunks are
/// separated by a blank line.
#[must_use]
pub fn format_context(hits: &[ScoredChunk]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(
            out,
            "file_path: {}\n\n{}",
            hit.chunk.metadata.file_path,
            hit.chunk.content.trim_end()
        );
    }
    out
}
