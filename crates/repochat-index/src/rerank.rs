//! Cross-encoder reranking via the `/v1/rerank` endpoint (TEI, Infinity, Jina-style).
//!
//! One batch request scores every query/candidate pair; candidates are then
//! reordered by relevance and cut to the requested count.

use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::store::ScoredChunk;

/// Relevance of one candidate, by position in the submitted list.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    /// Relevance in `0.0..=1.0` after sigmoid normalization.
    pub score: f32,
}

pub trait Reranker: Send + Sync {
    /// Score `documents` against `query`, best first, at most `top_n` hits.
    ///
    /// # Errors
    ///
    /// Returns an error if the reranking backend fails.
    fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> impl Future<Output = Result<Vec<RerankHit>>> + Send;
}

#[derive(Debug, Clone)]
pub struct CrossEncoderReranker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl CrossEncoderReranker {
    #[must_use]
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Self {
        Self {
            client: repochat_llm::http::default_client(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            timeout,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
        };

        let resp = self
            .client
            .post(format!("{}/v1/rerank", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Rerank(format!("failed to reach reranker: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("reranker error {status}: {text}");
            return Err(IndexError::Rerank(format!("reranker returned {status}")));
        }

        let parsed: RerankResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::Rerank(format!("invalid reranker response: {e}")))?;

        let mut hits: Vec<RerankHit> = parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .map(|r| RerankHit {
                index: r.index,
                score: sigmoid(r.relevance_score),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_n);
        Ok(hits)
    }
}

/// Reorder similarity candidates by reranker score and keep the best `k`.
///
/// # Errors
///
/// Propagates the reranker error; callers decide whether to fall back.
pub async fn rerank_chunks<R: Reranker>(
    reranker: &R,
    query: &str,
    candidates: Vec<ScoredChunk>,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    if candidates.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let documents: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
    let hits = reranker.rerank(query, &documents, k).await?;

    let mut slots: Vec<Option<ScoredChunk>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(k);
    for hit in hits {
        if let Some(mut chunk) = slots.get_mut(hit.index).and_then(Option::take) {
            chunk.score = hit.score;
            out.push(chunk);
            if out.len() == k {
                break;
            }
        }
    }
    Ok(out)
}

/// Sigmoid normalization: maps raw logits to 0-1 range.
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}
