use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::watch;

use repochat_channels::CliChannel;
use repochat_core::config::{Config, ProviderKind};
use repochat_core::repo::{GitCli, RepositoryAcquirer};
use repochat_core::{App, PromptTemplate};
use repochat_index::IndexBuilder;
use repochat_index::document::{DirectoryReader, SplitterConfig};
use repochat_index::rerank::CrossEncoderReranker;
use repochat_llm::any::AnyProvider;
use repochat_llm::compatible::CompatibleProvider;
use repochat_llm::ollama::OllamaProvider;
use repochat_llm::openai::OpenAiProvider;
use repochat_llm::provider::LlmProvider;

#[derive(Parser, Debug)]
#[command(name = "repochat", version, about = "Chat with a GitHub repository", long_about = None)]
struct Cli {
    /// Config file (default: $REPOCHAT_CONFIG or config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load this repository before the prompt opens
    #[arg(long)]
    repo: Option<String>,

    /// Where cloned repositories are kept
    #[arg(long)]
    repos_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    init_subscriber(&config_path);

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if let Some(dir) = cli.repos_dir {
        config.repos.dir = dir;
    }
    config.validate()?;

    let llm = create_llm_provider(&config)?;
    let embedder = create_embedding_provider(&config)?;
    health_check(&embedder).await;
    let reranker = create_reranker(&config);

    tracing::info!(
        llm = llm.name(),
        model = %config.llm.model,
        embedder = embedder.name(),
        embedding_model = %config.embedding.model,
        reranker = reranker.is_some(),
        repos_dir = %config.repos.dir.display(),
        "repochat starting"
    );

    let template = PromptTemplate::new(config.prompt.template.clone())?;
    let reader = DirectoryReader::new(&config.repos.extensions)
        .max_file_size(config.repos.max_file_size);
    let builder = IndexBuilder::new(SplitterConfig {
        chunk_size: config.retrieval.chunk_size,
        chunk_overlap: config.retrieval.chunk_overlap,
        ..SplitterConfig::default()
    });
    let acquirer = RepositoryAcquirer::new(
        GitCli::new(&config.repos.git_binary),
        &config.repos.dir,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let mut app = App::new(CliChannel::new(), acquirer, llm, embedder)
        .with_reader(reader)
        .with_index_builder(builder)
        .with_template(template)
        .with_top_k(config.retrieval.top_k)
        .with_shutdown(shutdown_rx);
    if let Some(reranker) = reranker {
        app = app.with_reranker(reranker, config.retrieval.rerank_candidates);
    }

    println!("repochat: /load <github-url> to index a repository, /help for commands.");
    if let Some(url) = &cli.repo {
        app.handle_load(url).await?;
    }
    app.run().await?;

    Ok(())
}

fn api_key(config: &Config, purpose: &str) -> anyhow::Result<String> {
    config
        .secrets
        .llm_api_key
        .as_ref()
        .map(|s| s.expose().to_owned())
        .with_context(|| {
            format!("{purpose} requires an API key: set REPOCHAT_LLM_API_KEY or GROQ_API_KEY")
        })
}

fn create_llm_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            config.embedding.model.clone(),
        ))),
        ProviderKind::OpenAi => Ok(AnyProvider::OpenAi(OpenAiProvider::new(
            api_key(config, "llm.provider = \"openai\"")?,
            llm.base_url.clone(),
            llm.model.clone(),
            llm.max_tokens,
            None,
        ))),
        ProviderKind::Compatible => {
            if llm.name.trim().is_empty() {
                bail!("llm.name must be set for compatible providers");
            }
            Ok(AnyProvider::Compatible(CompatibleProvider::new(
                llm.name.clone(),
                api_key(config, &format!("compatible provider {}", llm.name))?,
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                None,
            )))
        }
    }
}

fn create_embedding_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let emb = &config.embedding;
    let key = || {
        config
            .secrets
            .embedding_api_key
            .as_ref()
            .or(config.secrets.llm_api_key.as_ref())
            .map(|s| s.expose().to_owned())
            .context("remote embeddings require REPOCHAT_EMBEDDING_API_KEY or REPOCHAT_LLM_API_KEY")
    };
    match emb.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &emb.base_url,
            emb.model.clone(),
            emb.model.clone(),
        ))),
        ProviderKind::OpenAi => Ok(AnyProvider::OpenAi(OpenAiProvider::new(
            key()?,
            emb.base_url.clone(),
            emb.model.clone(),
            config.llm.max_tokens,
            Some(emb.model.clone()),
        ))),
        ProviderKind::Compatible => Ok(AnyProvider::Compatible(CompatibleProvider::new(
            "embeddings".to_owned(),
            key()?,
            emb.base_url.clone(),
            emb.model.clone(),
            config.llm.max_tokens,
            Some(emb.model.clone()),
        ))),
    }
}

fn create_reranker(config: &Config) -> Option<CrossEncoderReranker> {
    let base_url = config.reranker.base_url.as_deref()?;
    Some(CrossEncoderReranker::new(
        base_url,
        config.reranker.model.clone(),
        Duration::from_secs(config.reranker.timeout_secs),
    ))
}

async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOCHAT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Logs go to stderr, or to `logging.file` when the config names one, so they
/// never interleave with answers streamed on stdout.
fn init_subscriber(config_path: &Path) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_file = Config::load(config_path)
        .ok()
        .and_then(|c| c.logging.file)
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .inspect_err(|e| {
                    eprintln!("cannot open log file {}: {e}, logging to stderr", path.display());
                })
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
