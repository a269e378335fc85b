use crate::compatible::CompatibleProvider;
use crate::error::LlmError;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatStream, LlmProvider, Message};

/// Runs `$body` against whichever backend `$any` holds.
macro_rules! with_backend {
    ($any:expr, $p:ident => $body:expr) => {
        match $any {
            AnyProvider::Ollama($p) => $body,
            AnyProvider::OpenAi($p) => $body,
            AnyProvider::Compatible($p) => $body,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $body,
        }
    };
}

/// Backend chosen from configuration at startup.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        with_backend!(self, p => p.chat_stream(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        with_backend!(self, p => p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        with_backend!(self, p => p.supports_embeddings())
    }

    fn name(&self) -> &str {
        with_backend!(self, p => p.name())
    }
}
