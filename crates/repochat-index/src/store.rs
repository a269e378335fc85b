//! Brute-force in-memory vector index over repository chunks.

use std::cmp::Ordering;

use crate::document::Chunk;
use crate::error::{IndexError, Result};

/// A chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Immutable set of embedded chunks. Built only by
/// [`IndexBuilder`](crate::builder::IndexBuilder), so it is never empty.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimension: usize,
    document_count: usize,
}

impl VectorIndex {
    pub(crate) fn with_capacity(dimension: usize, document_count: usize, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            dimension,
            document_count,
        }
    }

    pub(crate) fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.entries.push(IndexedChunk { chunk, vector });
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of source documents the chunks were cut from.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// The `k` chunks most similar to `query`, best first. Ties keep index order.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::DimensionMismatch` if `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
