//! Per-session conversation state and the streamed chat turn.

use repochat_index::rerank::Reranker;
use repochat_llm::provider::{LlmProvider, Role};
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::channel::Channel;
use crate::error::{ChatError, QueryError};
use crate::query::QueryEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// One user's conversation: history plus the engine of the loaded repository.
///
/// Starts without an engine; [`submit_turn`](Self::submit_turn) refuses to run
/// until one is installed by a successful load.
pub struct Session<P: LlmProvider, R: Reranker> {
    id: Uuid,
    history: Vec<ChatTurn>,
    engine: Option<QueryEngine<P, R>>,
}

impl<P: LlmProvider, R: Reranker> Default for Session<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LlmProvider, R: Reranker> Session<P, R> {
    #[must_use]
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "session created");
        Self {
            id,
            history: Vec::new(),
            engine: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.engine.is_some()
    }

    /// Install the engine of a newly loaded repository. History is kept.
    pub fn set_engine(&mut self, engine: QueryEngine<P, R>) {
        if self.engine.replace(engine).is_some() {
            tracing::info!(session = %self.id, "query engine replaced");
        }
    }

    /// Forget the conversation; the loaded engine stays usable.
    pub fn reset_chat(&mut self) {
        self.history.clear();
        tracing::debug!(session = %self.id, "chat history cleared");
    }

    /// Ask `question`, render the answer fragment by fragment and return the full text.
    ///
    /// The user turn is recorded before the engine runs; the assistant turn only
    /// once the stream has been drained without error.
    ///
    /// # Errors
    ///
    /// `NotLoaded` when no repository is loaded (history untouched), `Query` when
    /// retrieval or generation fails, `Channel` when rendering fails.
    pub async fn submit_turn<C: Channel>(
        &mut self,
        question: &str,
        channel: &mut C,
    ) -> Result<String, ChatError> {
        let Some(engine) = &self.engine else {
            return Err(ChatError::NotLoaded);
        };

        self.history.push(ChatTurn {
            role: Role::User,
            content: question.to_owned(),
        });

        let mut stream = engine.query(question).await?;
        let mut answer = String::with_capacity(2048);

        while let Some(chunk_result) = stream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    answer.push_str(&chunk);
                    channel.send_chunk(&chunk).await?;
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, received = answer.len(), "answer stream failed: {e}");
                    channel.flush_chunks().await?;
                    return Err(QueryError::Llm(e).into());
                }
            }
        }

        channel.flush_chunks().await?;

        self.history.push(ChatTurn {
            role: Role::Assistant,
            content: answer.clone(),
        });
        Ok(answer)
    }
}
