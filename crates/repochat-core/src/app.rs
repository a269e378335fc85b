//! Interactive controller: reads commands and questions from a [`Channel`],
//! runs the load pipeline and dispatches chat turns to the [`Session`].

use repochat_index::document::{DirectoryReader, DocumentError};
use repochat_index::rerank::Reranker;
use repochat_index::{IndexBuilder, IndexError, Retriever};
use repochat_llm::provider::LlmProvider;
use tokio::sync::watch;

use crate::channel::Channel;
use crate::error::ChatError;
use crate::query::QueryEngine;
use crate::repo::{GitCloner, RepoSlug, RepositoryAcquirer};
use crate::session::Session;
use crate::template::PromptTemplate;

const HELP: &str = "Commands:\n  \
/load <github-url>  clone (if needed) and index a repository\n  \
/clear              forget the conversation, keep the loaded repository\n  \
/help               show this message\n  \
/quit               exit (also: exit, quit, Ctrl-D)\n\
Anything else is sent as a question about the loaded repository.";

const LOAD_USAGE: &str = "Usage: /load <github-url>";
const LOADED: &str = "Data loaded successfully!";
const READY: &str = "Ready to Chat!";
const NO_DATA: &str = "No data found, check if the repository is not empty!";
const INVALID_REPO: &str = "Invalid owner or repository";
const NOT_LOADED: &str = "Load a repository first with /load <url>.";
const CLEARED: &str = "Chat cleared.";

enum Command<'a> {
    Load(&'a str),
    Clear,
    Help,
    Quit,
    Ask(&'a str),
}

impl<'a> Command<'a> {
    fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        match trimmed {
            "/clear" => return Self::Clear,
            "/help" => return Self::Help,
            "/quit" | "exit" | "quit" => return Self::Quit,
            "/load" => return Self::Load(""),
            _ => {}
        }
        if let Some(url) = trimmed.strip_prefix("/load ") {
            return Self::Load(url.trim());
        }
        Self::Ask(trimmed)
    }
}

/// Wires the acquirer, loader, index builder and session to a frontend.
pub struct App<P, R, C, G>
where
    P: LlmProvider + Clone,
    R: Reranker + Clone,
    C: Channel,
    G: GitCloner,
{
    channel: C,
    session: Session<P, R>,
    acquirer: RepositoryAcquirer<G>,
    reader: DirectoryReader,
    builder: IndexBuilder,
    llm: P,
    embedder: P,
    reranker: Option<R>,
    template: PromptTemplate,
    top_k: usize,
    rerank_candidates: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<P, R, C, G> App<P, R, C, G>
where
    P: LlmProvider + Clone,
    R: Reranker + Clone,
    C: Channel,
    G: GitCloner,
{
    /// `llm` answers questions; `embedder` embeds chunks and queries.
    #[must_use]
    pub fn new(channel: C, acquirer: RepositoryAcquirer<G>, llm: P, embedder: P) -> Self {
        Self {
            channel,
            session: Session::new(),
            acquirer,
            reader: DirectoryReader::default(),
            builder: IndexBuilder::default(),
            llm,
            embedder,
            reranker: None,
            template: PromptTemplate::default(),
            top_k: repochat_index::retriever::DEFAULT_TOP_K,
            rerank_candidates: repochat_index::retriever::DEFAULT_TOP_K,
            shutdown: None,
        }
    }

    #[must_use]
    pub fn with_reader(mut self, reader: DirectoryReader) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub fn with_index_builder(mut self, builder: IndexBuilder) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: R, candidates: usize) -> Self {
        self.reranker = Some(reranker);
        self.rerank_candidates = candidates;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    #[must_use]
    pub fn session(&self) -> &Session<P, R> {
        &self.session
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Acquire, read, index and install a fresh query engine for `url`.
    ///
    /// On failure the previously loaded engine, if any, stays in place.
    ///
    /// # Errors
    ///
    /// `InvalidUrl`, `Clone` or `AcquisitionInconsistency` from acquisition,
    /// `EmptyRepository` when no file matched, `IndexBuild` when embedding fails.
    pub async fn load(&mut self, url: &str) -> Result<(), ChatError> {
        let slug = RepoSlug::parse(url)?;
        self.channel
            .send_status(&format!(
                "Loading {} repository by {}...",
                slug.name, slug.owner
            ))
            .await?;

        let (slug, path) = self.acquirer.acquire(url).await?;

        let documents = self.reader.load(&path).await.map_err(|e| match e {
            DocumentError::NoDocuments(dir) => ChatError::EmptyRepository(dir),
            DocumentError::Io(e) => ChatError::Io(e),
            other => ChatError::IndexBuild(IndexError::Document(other)),
        })?;

        let index = self
            .builder
            .build(&documents, &self.embedder)
            .await
            .map_err(ChatError::IndexBuild)?;

        tracing::info!(
            session = %self.session.id(),
            owner = %slug.owner,
            repo = %slug.name,
            documents = documents.len(),
            chunks = index.len(),
            "repository loaded"
        );

        let retriever = Retriever::new(index, self.embedder.clone(), self.top_k);
        let mut engine = QueryEngine::new(self.llm.clone(), retriever, self.template.clone());
        if let Some(reranker) = &self.reranker {
            engine = engine.with_reranker(reranker.clone(), self.rerank_candidates);
        }
        self.session.set_engine(engine);
        Ok(())
    }

    /// Run [`load`](Self::load) and report the outcome to the user.
    ///
    /// # Errors
    ///
    /// Only channel failures; load failures are rendered as messages.
    pub async fn handle_load(&mut self, url: &str) -> Result<(), ChatError> {
        if url.is_empty() {
            self.channel.send(LOAD_USAGE).await?;
            return Ok(());
        }

        match self.load(url).await {
            Ok(()) => {
                self.channel.send(LOADED).await?;
                self.channel.send(READY).await?;
            }
            Err(ChatError::Channel(e)) => return Err(e.into()),
            Err(e) if e.is_empty_repository() => {
                tracing::info!(url, "{e}");
                self.channel.send(NO_DATA).await?;
            }
            Err(ChatError::InvalidUrl(u)) => {
                tracing::warn!(url = %u, "rejected repository url");
                self.channel.send(INVALID_REPO).await?;
            }
            Err(e) => {
                tracing::error!(url, "load failed: {e}");
                self.channel.send(&format!("An error occurred: {e}")).await?;
            }
        }
        Ok(())
    }

    async fn handle_question(&mut self, question: &str) -> Result<(), ChatError> {
        if question.is_empty() {
            return Ok(());
        }
        match self.session.submit_turn(question, &mut self.channel).await {
            Ok(_) => Ok(()),
            Err(ChatError::NotLoaded) => {
                self.channel.send(NOT_LOADED).await?;
                Ok(())
            }
            Err(ChatError::Channel(e)) => Err(e.into()),
            Err(e) => {
                tracing::error!(session = %self.session.id(), "chat turn failed: {e}");
                self.channel.send(&format!("An error occurred: {e}")).await?;
                Ok(())
            }
        }
    }

    /// Handle one line of input. Returns `false` when the user asked to quit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel fails.
    pub async fn dispatch(&mut self, input: &str) -> Result<bool, ChatError> {
        match Command::parse(input) {
            Command::Quit => return Ok(false),
            Command::Help => self.channel.send(HELP).await?,
            Command::Clear => {
                self.session.reset_chat();
                self.channel.send(CLEARED).await?;
            }
            Command::Load(url) => self.handle_load(url).await?,
            Command::Ask(question) => self.handle_question(question).await?,
        }
        Ok(true)
    }

    /// Read and dispatch input until EOF, a quit command or shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel fails.
    pub async fn run(&mut self) -> Result<(), ChatError> {
        loop {
            let incoming = tokio::select! {
                result = self.channel.recv() => result?,
                () = shutdown_signal(&mut self.shutdown) => {
                    tracing::info!("shutting down");
                    break;
                }
            };
            let Some(msg) = incoming else { break };

            if !self.dispatch(&msg.text).await? {
                break;
            }
        }
        tracing::info!(session = %self.session.id(), turns = self.session.history().len(), "session ended");
        Ok(())
    }
}

async fn shutdown_signal(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use repochat_index::rerank::CrossEncoderReranker;
    use repochat_llm::mock::MockProvider;

    use super::*;
    use crate::channel::{ChannelError, ChannelMessage};

    #[derive(Default)]
    struct RecordingChannel {
        inputs: VecDeque<String>,
        sent: Vec<String>,
        statuses: Vec<String>,
        chunks: Vec<String>,
    }

    impl RecordingChannel {
        fn with_inputs(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs.iter().map(|&s| s.to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    impl Channel for RecordingChannel {
        async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
            Ok(self.inputs.pop_front().map(|text| ChannelMessage { text }))
        }

        async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
            self.sent.push(text.to_owned());
            Ok(())
        }

        async fn send_chunk(&mut self, chunk: &str) -> Result<(), ChannelError> {
            self.chunks.push(chunk.to_owned());
            Ok(())
        }

        async fn flush_chunks(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_status(&mut self, text: &str) -> Result<(), ChannelError> {
            self.statuses.push(text.to_owned());
            Ok(())
        }
    }

    /// Writes fixture files into the target instead of running git.
    #[derive(Clone, Default)]
    struct FixtureCloner {
        files: Vec<(&'static str, &'static str)>,
        calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
    }

    impl GitCloner for FixtureCloner {
        async fn clone_repo(&self, url: &str, target: &Path) -> Result<(), ChatError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_owned(), target.to_path_buf()));
            std::fs::create_dir_all(target)?;
            for (name, body) in &self.files {
                std::fs::write(target.join(name), body)?;
            }
            Ok(())
        }
    }

    type TestApp = App<MockProvider, CrossEncoderReranker, RecordingChannel, FixtureCloner>;

    fn app(dir: &Path, cloner: FixtureCloner, inputs: &[&str]) -> TestApp {
        app_with_handle(dir, cloner, inputs).0
    }

    /// The app plus a handle sharing the mock's call logs.
    fn app_with_handle(
        dir: &Path,
        cloner: FixtureCloner,
        inputs: &[&str],
    ) -> (TestApp, MockProvider) {
        let llm = MockProvider::with_responses(vec!["The answer.".into()])
            .with_keyword_embeddings(["widget", "router"]);
        let app = App::new(
            RecordingChannel::with_inputs(inputs),
            RepositoryAcquirer::new(cloner, dir),
            llm.clone(),
            llm.clone(),
        );
        (app, llm)
    }

    fn widgets_cloner() -> FixtureCloner {
        FixtureCloner {
            files: vec![
                ("README.md", "# Widgets\nA widget library."),
                ("router.py", "def router():\n    pass\n"),
            ],
            ..FixtureCloner::default()
        }
    }

    #[tokio::test]
    async fn load_then_ask() {
        let dir = tempfile::tempdir().unwrap();
        let cloner = widgets_cloner();
        let mut app = app(
            dir.path(),
            cloner.clone(),
            &["/load https://github.com/acme/widgets", "What is a widget?"],
        );

        app.run().await.unwrap();

        let ch = app.channel();
        assert_eq!(ch.statuses, vec!["Loading widgets repository by acme..."]);
        assert_eq!(ch.sent, vec![LOADED, READY]);
        assert_eq!(ch.chunks.concat(), "The answer.");
        assert_eq!(app.session().history().len(), 2);

        let calls = cloner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://github.com/acme/widgets");
        assert_eq!(calls[0].1, dir.path().join("acme").join("widgets"));
    }

    #[tokio::test]
    async fn question_before_load_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), widgets_cloner(), &["hello?"]);

        app.run().await.unwrap();

        assert_eq!(app.channel().sent, vec![NOT_LOADED]);
        assert!(app.session().history().is_empty());
    }

    #[tokio::test]
    async fn invalid_url_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cloner = widgets_cloner();
        let mut app = app(dir.path(), cloner.clone(), &["/load https://gitlab.com/a/b"]);

        app.run().await.unwrap();

        assert_eq!(app.channel().sent, vec![INVALID_REPO]);
        assert!(app.channel().statuses.is_empty());
        assert!(cloner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_repository_is_informational() {
        let dir = tempfile::tempdir().unwrap();
        let cloner = FixtureCloner {
            files: vec![("image.png", "not text")],
            ..FixtureCloner::default()
        };
        let (mut app, llm) =
            app_with_handle(dir.path(), cloner, &["/load https://github.com/acme/empty"]);

        app.run().await.unwrap();

        assert_eq!(app.channel().sent, vec![NO_DATA]);
        assert!(!app.session().is_loaded());
        assert!(llm.embedded().is_empty());
        assert!(llm.received().is_empty());
    }

    #[tokio::test]
    async fn blank_files_repository_is_informational() {
        let dir = tempfile::tempdir().unwrap();
        let cloner = FixtureCloner {
            files: vec![("__init__.py", ""), ("README.md", "  \n")],
            ..FixtureCloner::default()
        };
        let (mut app, llm) = app_with_handle(
            dir.path(),
            cloner,
            &["/load https://github.com/acme/blank", "what is this?"],
        );

        app.run().await.unwrap();

        assert_eq!(app.channel().sent, vec![NO_DATA, NOT_LOADED]);
        assert!(!app.session().is_loaded());
        assert!(llm.embedded().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_is_reported_and_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let llm = MockProvider::default();
        let mut app: TestApp = App::new(
            RecordingChannel::with_inputs(&["/load https://github.com/acme/widgets", "/help"]),
            RepositoryAcquirer::new(widgets_cloner(), dir.path()),
            llm.clone(),
            llm,
        );

        app.run().await.unwrap();

        let sent = &app.channel().sent;
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("An error occurred: index build failed"));
        assert_eq!(sent[1], HELP);
        assert!(!app.session().is_loaded());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(
            dir.path(),
            widgets_cloner(),
            &[
                "/load https://github.com/acme/widgets",
                "/load not-a-url",
                "widget?",
            ],
        );

        app.run().await.unwrap();

        assert_eq!(app.channel().sent, vec![LOADED, READY, INVALID_REPO]);
        assert_eq!(app.session().history().len(), 2);
    }

    #[tokio::test]
    async fn clear_resets_history_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(
            dir.path(),
            widgets_cloner(),
            &["/load https://github.com/acme/widgets", "widget?", "/clear"],
        );

        app.run().await.unwrap();

        assert!(app.session().history().is_empty());
        assert!(app.session().is_loaded());
        assert_eq!(app.channel().sent.last().map(String::as_str), Some(CLEARED));
    }

    #[tokio::test]
    async fn quit_stops_before_remaining_input() {
        let dir = tempfile::tempdir().unwrap();
        for quit in ["/quit", "exit", "quit", "  quit  "] {
            let mut app = app(dir.path(), widgets_cloner(), &[quit, "/help"]);
            app.run().await.unwrap();
            assert!(app.channel().sent.is_empty(), "{quit}");
        }
    }

    #[tokio::test]
    async fn load_without_url_prints_usage() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), widgets_cloner(), &["/load", "/load   "]);
        app.run().await.unwrap();
        assert_eq!(app.channel().sent, vec![LOAD_USAGE, LOAD_USAGE]);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), widgets_cloner(), &["", "   "]);
        app.run().await.unwrap();
        assert!(app.channel().sent.is_empty());
    }

    #[tokio::test]
    async fn mid_stream_failure_is_shown() {
        let dir = tempfile::tempdir().unwrap();
        let llm = MockProvider::with_responses(vec!["broken".into()])
            .with_keyword_embeddings(["widget"])
            .with_stream_failure_after(2);
        let mut app: TestApp = App::new(
            RecordingChannel::with_inputs(&["/load https://github.com/acme/widgets", "widget?"]),
            RepositoryAcquirer::new(widgets_cloner(), dir.path()),
            llm.clone(),
            llm,
        );

        app.run().await.unwrap();

        let ch = app.channel();
        assert_eq!(ch.chunks.concat(), "br");
        assert!(ch.sent.last().unwrap().starts_with("An error occurred: query failed"));
        assert_eq!(app.session().history().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_signal_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut app = app(dir.path(), widgets_cloner(), &["/help"]).with_shutdown(rx);

        app.run().await.unwrap();
        // Either branch may win the first select; the loop must end either way.
        assert!(app.channel().sent.len() <= 1);
    }

    #[test]
    fn command_parsing() {
        assert!(matches!(Command::parse(" /load  https://x "), Command::Load("https://x")));
        assert!(matches!(Command::parse("/clear"), Command::Clear));
        assert!(matches!(Command::parse("/help"), Command::Help));
        assert!(matches!(Command::parse("exit"), Command::Quit));
        assert!(matches!(Command::parse("/loader"), Command::Ask("/loader")));
        assert!(matches!(Command::parse(" why? "), Command::Ask("why?")));
    }
}
