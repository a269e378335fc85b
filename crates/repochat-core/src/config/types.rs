use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secret::Secret;
use crate::template::DEFAULT_TEMPLATE;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub repos: ReposConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Model backend selector, shared by the chat and embedding sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Compatible,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_llm_provider() -> ProviderKind {
    ProviderKind::Compatible
}

fn default_llm_name() -> String {
    "groq".into()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}

fn default_llm_model() -> String {
    "llama3-70b-8192".into()
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: ProviderKind,
    /// Label reported for `compatible` endpoints (e.g. `groq`).
    #[serde(default = "default_llm_name")]
    pub name: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            name: default_llm_name(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_embedding_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "bge-large".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

fn default_reranker_model() -> String {
    "bge-reranker-large".into()
}

fn default_reranker_timeout() -> u64 {
    10
}

/// Cross-encoder reranker. Disabled unless `base_url` is set.
#[derive(Debug, Deserialize, Serialize)]
pub struct RerankerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_reranker_timeout")]
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_reranker_model(),
            timeout_secs: default_reranker_timeout(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

fn default_rerank_candidates() -> usize {
    12
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_rerank_candidates")]
    pub rerank_candidates: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_candidates: default_rerank_candidates(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("./repos")
}

fn default_extensions() -> Vec<String> {
    repochat_index::document::DEFAULT_EXTENSIONS
        .iter()
        .map(|&e| e.to_owned())
        .collect()
}

fn default_max_file_size() -> u64 {
    repochat_index::document::DEFAULT_MAX_FILE_SIZE
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReposConfig {
    #[serde(default = "default_repos_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_git_binary")]
    pub git_binary: PathBuf,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            dir: default_repos_dir(),
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            git_binary: default_git_binary(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_owned()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PromptConfig {
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Append logs to this file instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Credentials picked up from the environment. Never read from or written to TOML.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub llm_api_key: Option<Secret>,
    pub embedding_api_key: Option<Secret>,
}
