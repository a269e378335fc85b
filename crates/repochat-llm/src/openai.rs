use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::sse::fragment_stream;

/// Client for any endpoint speaking the `OpenAI` chat-completions protocol.
///
/// Answers are always requested with `stream: true`. Embeddings are only
/// available when an embedding model is configured.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            max_tokens,
            embedding_model,
        }
    }

    /// POST `body` as JSON to `endpoint` and return the response once the
    /// status is known to be a success.
    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        let detail = response.text().await.unwrap_or_default();
        tracing::error!(%status, endpoint, body = %detail, "provider request rejected");
        Err(LlmError::Other(format!(
            "{endpoint} request failed (status {status})"
        )))
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            stream: true,
        };
        let response = self.post("chat/completions", &request).await?;
        Ok(fragment_stream(response))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let Some(model) = self.embedding_model.as_deref() else {
            return Err(LlmError::EmbedUnsupported {
                provider: self.name().to_owned(),
            });
        };

        let reply: EmbeddingReply = self
            .post("embeddings", &EmbeddingRequest { input: text, model })
            .await?
            .json()
            .await?;

        reply
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.name().to_owned(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingReply {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}
