use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message, Role};

const DEFAULT_PORT: u16 = 11434;

/// Local Ollama server. The default embedding backend.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    chat_model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, chat_model: String, embedding_model: String) -> Self {
        let (host, port) = split_port(base_url);
        Self {
            client: Ollama::new(host, port),
            chat_model,
            embedding_model,
        }
    }

    /// Lists local models to confirm the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client
            .list_local_models()
            .await
            .map(|_| ())
            .map_err(|e| LlmError::Other(format!("failed to connect to Ollama, is it running? {e}")))
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let history = messages.iter().map(to_ollama).collect();
        let replies = self
            .client
            .send_chat_messages_stream(ChatMessageRequest::new(self.chat_model.clone(), history))
            .await
            .map_err(|e| LlmError::Other(format!("Ollama streaming request failed: {e}")))?;

        Ok(Box::pin(replies.map(|reply| {
            reply
                .map(|r| r.message.content)
                .map_err(|()| LlmError::Other("Ollama stream chunk failed".into()))
        })))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request =
            GenerateEmbeddingsRequest::new(self.embedding_model.clone(), EmbeddingsInput::from(text));
        let mut vectors = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?
            .embeddings;

        if vectors.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "ollama".into(),
            });
        }
        Ok(vectors.swap_remove(0))
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn to_ollama(msg: &Message) -> ChatMessage {
    let build = match msg.role {
        Role::System => ChatMessage::system,
        Role::User => ChatMessage::user,
        Role::Assistant => ChatMessage::assistant,
    };
    build(msg.content.clone())
}

/// `http://host:port` into `("http://host", port)`; no port means 11434.
fn split_port(base_url: &str) -> (String, u16) {
    let url = base_url.trim_end_matches('/');
    match url
        .rsplit_once(':')
        .and_then(|(host, port)| Some((host, port.parse().ok()?)))
    {
        Some((host, port)) => (host.to_owned(), port),
        None => (url.to_owned(), DEFAULT_PORT),
    }
}
