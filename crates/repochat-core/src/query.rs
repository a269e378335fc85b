//! Retrieval-augmented question answering over one loaded repository.

use repochat_index::Retriever;
use repochat_index::rerank::{Reranker, rerank_chunks};
use repochat_index::retriever::format_context;
use repochat_llm::provider::{ChatStream, LlmProvider, Message};

use crate::error::QueryError;
use crate::template::PromptTemplate;

/// Index + LLM + prompt template, with an optional cross-encoder pass.
///
/// Stateless across calls: every [`query`](Self::query) retrieves, fills the
/// template and opens a fresh answer stream.
pub struct QueryEngine<P: LlmProvider, R: Reranker> {
    llm: P,
    retriever: Retriever<P>,
    template: PromptTemplate,
    reranker: Option<R>,
    rerank_candidates: usize,
}

impl<P: LlmProvider, R: Reranker> QueryEngine<P, R> {
    #[must_use]
    pub fn new(llm: P, retriever: Retriever<P>, template: PromptTemplate) -> Self {
        Self {
            llm,
            retriever,
            template,
            reranker: None,
            rerank_candidates: 0,
        }
    }

    /// Retrieve `candidates` chunks by similarity and let `reranker` pick the final `top_k`.
    #[must_use]
    pub fn with_reranker(mut self, reranker: R, candidates: usize) -> Self {
        self.reranker = Some(reranker);
        self.rerank_candidates = candidates;
        self
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<P> {
        &self.retriever
    }

    /// Build the filled prompt for `question`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Retrieval` if embedding the question or searching fails.
    pub async fn prompt(&self, question: &str) -> Result<String, QueryError> {
        let k = self.retriever.top_k();
        let hits = match &self.reranker {
            None => self.retriever.retrieve(question).await?,
            Some(reranker) => {
                let n = self.rerank_candidates.max(k);
                let candidates = self.retriever.retrieve_n(question, n).await?;
                match rerank_chunks(reranker, question, candidates.clone(), k).await {
                    Ok(reranked) => reranked,
                    Err(e) => {
                        tracing::warn!("reranker failed, using similarity order: {e}");
                        let mut fallback = candidates;
                        fallback.truncate(k);
                        fallback
                    }
                }
            }
        };

        tracing::debug!(chunks = hits.len(), "context assembled");
        Ok(self.template.render(&format_context(&hits), question))
    }

    /// Answer `question` as a stream of text fragments.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if retrieval fails or the LLM rejects the request.
    /// Errors raised while the stream is consumed arrive as stream items.
    pub async fn query(&self, question: &str) -> Result<ChatStream, QueryError> {
        let prompt = self.prompt(question).await?;
        let stream = self.llm.chat_stream(&[Message::user(prompt)]).await?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use repochat_index::IndexBuilder;
    use repochat_index::document::{Document, DocumentMetadata};
    use repochat_index::rerank::{CrossEncoderReranker, RerankHit};
    use repochat_llm::mock::MockProvider;
    use repochat_llm::provider::Role;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct ReverseReranker;

    impl Reranker for ReverseReranker {
        #[allow(clippy::cast_precision_loss)]
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            top_n: usize,
        ) -> repochat_index::Result<Vec<RerankHit>> {
            Ok((0..documents.len())
                .rev()
                .take(top_n)
                .map(|index| RerankHit {
                    index,
                    score: 1.0 / (index as f32 + 1.0),
                })
                .collect())
        }
    }

    fn doc(path: &str, content: &str) -> Document {
        Document {
            content: content.to_owned(),
            metadata: DocumentMetadata {
                source: format!("/repos/acme/widgets/{path}"),
                file_path: path.to_owned(),
                content_type: "text/plain".to_owned(),
            },
        }
    }

    fn provider() -> MockProvider {
        MockProvider::with_responses(vec!["It uses postgres.".into()])
            .with_keyword_embeddings(["router", "database", "widget", "cache"])
    }

    async fn retriever(provider: &MockProvider, top_k: usize) -> Retriever<MockProvider> {
        let docs = vec![
            doc("routes.py", "The router maps paths to handlers."),
            doc("db.py", "Opens the database pool. The database is postgres."),
            doc("ui.js", "Renders a widget. The widget has a database badge."),
            doc("cache.py", "An LRU cache in front of the database."),
        ];
        let index = IndexBuilder::default()
            .build(&docs, provider)
            .await
            .unwrap();
        Retriever::new(index, provider.clone(), top_k)
    }

    async fn engine(top_k: usize) -> (QueryEngine<MockProvider, ReverseReranker>, MockProvider) {
        let p = provider();
        let r = retriever(&p, top_k).await;
        (QueryEngine::new(p.clone(), r, PromptTemplate::default()), p)
    }

    fn context_files(prompt: &str) -> Vec<&str> {
        prompt
            .lines()
            .filter_map(|l| l.strip_prefix("file_path: "))
            .collect()
    }

    #[tokio::test]
    async fn prompt_contains_question_context_and_fallback() {
        let (engine, _) = engine(2).await;
        let prompt = engine.prompt("Which database is used?").await.unwrap();

        assert!(prompt.contains("Query: Which database is used?\nAnswer: "));
        assert!(prompt.contains("file_path: db.py\n\nOpens the database pool."));
        assert!(prompt.contains("I don't know!"));
    }

    #[tokio::test]
    async fn context_holds_at_most_k_chunks_in_similarity_order() {
        let (engine, _) = engine(2).await;
        let prompt = engine.prompt("database").await.unwrap();
        let files = context_files(&prompt);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], "db.py");
    }

    #[tokio::test]
    async fn query_streams_answer_from_single_user_message() {
        let (engine, p) = engine(2).await;
        let mut stream = engine.query("Which database?").await.unwrap();

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            answer.push_str(&chunk.unwrap());
        }
        assert_eq!(answer, "It uses postgres.");

        let received = p.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 1);
        assert_eq!(received[0][0].role, Role::User);
        assert!(received[0][0].content.contains("Query: Which database?"));
    }

    #[tokio::test]
    async fn reranker_reorders_candidates() {
        let p = provider();
        let r = retriever(&p, 2).await;
        let engine = QueryEngine::new(p, r, PromptTemplate::default()).with_reranker(ReverseReranker, 4);

        let similarity = engine.retriever().retrieve_n("database", 4).await.unwrap();
        let prompt = engine.prompt("database").await.unwrap();
        let files = context_files(&prompt);

        assert_eq!(files.len(), 2);
        assert_eq!(files[0], similarity[3].chunk.metadata.file_path);
        assert_eq!(files[1], similarity[2].chunk.metadata.file_path);
    }

    #[tokio::test]
    async fn failing_reranker_falls_back_to_similarity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider();
        let r = retriever(&p, 2).await;
        let reranker = CrossEncoderReranker::new(
            &server.uri(),
            "bge-reranker-large".into(),
            Duration::from_secs(5),
        );
        let engine = QueryEngine::new(p, r, PromptTemplate::default()).with_reranker(reranker, 4);

        let prompt = engine.prompt("database").await.unwrap();
        let files = context_files(&prompt);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], "db.py");
    }

    #[tokio::test]
    async fn custom_template_is_used() {
        let p = provider();
        let r = retriever(&p, 1).await;
        let template = PromptTemplate::new("Q={query_str}\nC={context_str}").unwrap();
        let engine: QueryEngine<_, ReverseReranker> = QueryEngine::new(p, r, template);

        let prompt = engine.prompt("router").await.unwrap();
        assert!(prompt.starts_with("Q=router\nC=file_path: routes.py"));
    }

    #[tokio::test]
    async fn embedding_failure_is_retrieval_error() {
        let p = provider();
        let index = IndexBuilder::default()
            .build(&[doc("a.py", "router")], &p)
            .await
            .unwrap();
        let mut failing = p.clone();
        failing.fail_embed = true;
        let engine: QueryEngine<_, ReverseReranker> = QueryEngine::new(
            p,
            Retriever::new(index, failing, 2),
            PromptTemplate::default(),
        );

        assert!(matches!(
            engine.query("router").await,
            Err(QueryError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn llm_failure_is_llm_error() {
        let p = provider();
        let r = retriever(&p, 2).await;
        let mut llm = p.clone();
        llm.fail_chat = true;
        let engine: QueryEngine<_, ReverseReranker> =
            QueryEngine::new(llm, r, PromptTemplate::default());

        assert!(matches!(engine.query("router").await, Err(QueryError::Llm(_))));
    }
}
