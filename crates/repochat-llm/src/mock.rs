//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

/// Scripted provider. Clones share the reply queue and the call logs, so a
/// test can keep one handle and inspect what the code under test sent.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    received: Arc<Mutex<Vec<Vec<Message>>>>,
    embedded: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    /// When non-empty, `embed` returns one dimension per keyword holding its
    /// occurrence count in the (lowercased) text.
    pub keywords: Vec<String>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Yield this many fragments, then a stream error.
    pub fail_stream_after: Option<usize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::default(),
            received: Arc::default(),
            embedded: Arc::default(),
            default_response: "mock response".into(),
            embedding: vec![0.0; 384],
            keywords: Vec::new(),
            supports_embeddings: false,
            fail_chat: false,
            fail_embed: false,
            fail_stream_after: None,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self.supports_embeddings = true;
        self
    }

    #[must_use]
    pub fn with_keyword_embeddings<S: Into<String>>(
        mut self,
        keywords: impl IntoIterator<Item = S>,
    ) -> Self {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.into().to_lowercase())
            .collect();
        self.supports_embeddings = true;
        self
    }

    #[must_use]
    pub fn with_stream_failure_after(mut self, fragments: usize) -> Self {
        self.fail_stream_after = Some(fragments);
        self
    }

    /// Message lists passed to `chat_stream`, oldest first.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().unwrap().clone()
    }

    /// Texts passed to `embed`, oldest first.
    #[must_use]
    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    fn next_reply(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.received.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn keyword_vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| lower.matches(k.as_str()).count() as f32)
            .collect()
    }
}

impl LlmProvider for MockProvider {
    /// One fragment per character of the next scripted reply.
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let reply = self.next_reply(messages)?;
        let mut fragments: Vec<Result<String, LlmError>> =
            reply.chars().map(|c| Ok(c.to_string())).collect();
        if let Some(n) = self.fail_stream_after {
            fragments.truncate(n);
            fragments.push(Err(LlmError::SseParse("mock stream dropped".into())));
        }
        Ok(Box::pin(tokio_stream::iter(fragments)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embedded.lock().unwrap().push(text.to_owned());
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if self.keywords.is_empty() {
            Ok(self.embedding.clone())
        } else {
            Ok(self.keyword_vector(text))
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
