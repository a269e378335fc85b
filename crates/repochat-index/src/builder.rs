//! Index construction orchestrator: split → embed → store.

use std::time::Instant;

use repochat_llm::provider::LlmProvider;

use crate::document::{Chunk, Document, SplitterConfig, TextSplitter};
use crate::error::{IndexError, Result};
use crate::store::VectorIndex;

/// Text sent to the embedding model for a chunk. The file path helps
/// questions that name a module or file land on the right chunks.
#[must_use]
pub fn embedding_text(chunk: &Chunk) -> String {
    let mut text = String::with_capacity(chunk.content.len() + chunk.metadata.file_path.len() + 8);
    text.push_str("file: ");
    text.push_str(&chunk.metadata.file_path);
    text.push('\n');
    text.push_str(&chunk.content);
    text
}

/// Builds a fresh [`VectorIndex`] from loaded documents.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    splitter: TextSplitter,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            splitter: TextSplitter::new(config),
        }
    }

    /// Split, embed and store every document. Always a full rebuild.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Empty` when there is nothing to embed, and the first
    /// embedding or dimension error otherwise. No partial index is returned.
    pub async fn build<P: LlmProvider>(
        &self,
        documents: &[Document],
        provider: &P,
    ) -> Result<VectorIndex> {
        let start = Instant::now();

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|d| self.splitter.split(d))
            .collect();

        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }

        let total = chunks.len();
        tracing::info!(
            documents = documents.len(),
            chunks = total,
            provider = provider.name(),
            "index build started"
        );

        let mut index: Option<VectorIndex> = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let vector = provider.embed(&embedding_text(&chunk)).await?;
            if vector.is_empty() {
                return Err(IndexError::EmptyEmbedding);
            }

            let index = index.get_or_insert_with(|| {
                VectorIndex::with_capacity(vector.len(), documents.len(), total)
            });
            index.insert(chunk, vector)?;

            if (i + 1) % 100 == 0 {
                tracing::debug!(progress = format_args!("{}/{total}", i + 1), "embedding");
            }
        }

        let index = index.ok_or(IndexError::Empty)?;

        let duration_ms: u64 = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            documents = index.document_count(),
            chunks = index.len(),
            dimension = index.dimension(),
            duration_ms,
            "index build finished"
        );

        Ok(index)
    }
}
