use crate::error::LlmError;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatStream, LlmProvider, Message};

/// A third-party host of the `OpenAI` protocol (Groq, Together, vLLM...).
///
/// Requests go through [`OpenAiProvider`]; only the name reported in logs
/// and errors differs.
#[derive(Debug, Clone)]
pub struct CompatibleProvider {
    name: String,
    wire: OpenAiProvider,
}

impl CompatibleProvider {
    #[must_use]
    pub fn new(
        name: String,
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        Self {
            name,
            wire: OpenAiProvider::new(api_key, base_url, model, max_tokens, embedding_model),
        }
    }
}

impl LlmProvider for CompatibleProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.wire.chat_stream(messages).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.wire.embed(text).await.map_err(|e| match e {
            LlmError::EmbedUnsupported { .. } => LlmError::EmbedUnsupported {
                provider: self.name.clone(),
            },
            other => other,
        })
    }

    fn supports_embeddings(&self) -> bool {
        self.wire.supports_embeddings()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
