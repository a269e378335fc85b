use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;
use crate::secret::Secret;

const ENV_KEYS: [&str; 14] = [
    "REPOCHAT_LLM_PROVIDER",
    "REPOCHAT_LLM_BASE_URL",
    "REPOCHAT_LLM_MODEL",
    "REPOCHAT_EMBEDDING_PROVIDER",
    "REPOCHAT_EMBEDDING_BASE_URL",
    "REPOCHAT_EMBEDDING_MODEL",
    "REPOCHAT_RERANKER_BASE_URL",
    "REPOCHAT_RERANKER_MODEL",
    "REPOCHAT_RETRIEVAL_TOP_K",
    "REPOCHAT_REPOS_DIR",
    "REPOCHAT_LLM_API_KEY",
    "GROQ_API_KEY",
    "REPOCHAT_EMBEDDING_API_KEY",
    "REPOCHAT_CONFIG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn defaults_match_hosted_groq_setup() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Compatible);
    assert_eq!(config.llm.name, "groq");
    assert_eq!(config.llm.base_url, "https://api.groq.com/openai/v1");
    assert_eq!(config.llm.model, "llama3-70b-8192");
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.embedding.base_url, "http://localhost:11434");
    assert_eq!(config.embedding.model, "bge-large");
    assert!(config.reranker.base_url.is_none());
    assert_eq!(config.reranker.model, "bge-reranker-large");
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.retrieval.rerank_candidates, 12);
    assert_eq!(config.retrieval.chunk_size, 1024);
    assert_eq!(config.retrieval.chunk_overlap, 200);
    assert_eq!(config.repos.dir, std::path::PathBuf::from("./repos"));
    assert_eq!(
        config.repos.extensions,
        vec!["py", "ipynb", "js", "ts", "md", "pdf"]
    );
    assert!(config.logging.file.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/repochat.toml")).unwrap();
    assert_eq!(config.retrieval.top_k, 4);
}

#[test]
#[serial]
fn parse_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[llm]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"

[retrieval]
top_k = 6

[repos]
dir = "/var/lib/repochat"
extensions = ["rs", "md"]
"#,
    );

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.max_tokens, 1024);
    assert_eq!(config.retrieval.top_k, 6);
    assert_eq!(config.retrieval.chunk_size, 1024);
    assert_eq!(config.repos.extensions, vec!["rs", "md"]);
    assert_eq!(config.repos.git_binary, std::path::PathBuf::from("git"));
    assert_eq!(config.embedding.model, "bge-large");
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[retrieval\ntop_k = ");
    clear_env();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
#[serial]
fn unknown_provider_in_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[llm]\nprovider = \"claude\"\n");
    clear_env();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[llm]\nmodel = \"from-file\"\n");

    clear_env();
    unsafe {
        std::env::set_var("REPOCHAT_LLM_MODEL", "from-env");
        std::env::set_var("REPOCHAT_EMBEDDING_PROVIDER", "openai");
        std::env::set_var("REPOCHAT_EMBEDDING_MODEL", "text-embedding-3-small");
        std::env::set_var("REPOCHAT_RERANKER_BASE_URL", "http://localhost:7997");
        std::env::set_var("REPOCHAT_RETRIEVAL_TOP_K", "8");
        std::env::set_var("REPOCHAT_REPOS_DIR", "/tmp/snapshots");
    }

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.llm.model, "from-env");
    assert_eq!(config.embedding.provider, ProviderKind::OpenAi);
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(
        config.reranker.base_url.as_deref(),
        Some("http://localhost:7997")
    );
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.repos.dir, std::path::PathBuf::from("/tmp/snapshots"));
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("REPOCHAT_LLM_PROVIDER", "skynet");
        std::env::set_var("REPOCHAT_RETRIEVAL_TOP_K", "many");
    }

    let config = Config::load(Path::new("/nonexistent.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Compatible);
    assert_eq!(config.retrieval.top_k, 4);
}

#[test]
#[serial]
fn api_key_prefers_repochat_var_over_groq() {
    clear_env();
    unsafe {
        std::env::set_var("GROQ_API_KEY", "gsk-groq");
    }
    let config = Config::load(Path::new("/nonexistent.toml")).unwrap();
    assert_eq!(
        config.secrets.llm_api_key.as_ref().map(Secret::expose),
        Some("gsk-groq")
    );

    unsafe {
        std::env::set_var("REPOCHAT_LLM_API_KEY", "rc-key");
    }
    let config = Config::load(Path::new("/nonexistent.toml")).unwrap();
    clear_env();
    assert_eq!(
        config.secrets.llm_api_key.as_ref().map(Secret::expose),
        Some("rc-key")
    );
    assert!(config.secrets.embedding_api_key.is_none());
}

#[test]
#[serial]
fn empty_api_key_is_treated_as_unset() {
    clear_env();
    unsafe {
        std::env::set_var("REPOCHAT_LLM_API_KEY", "  ");
    }
    let config = Config::load(Path::new("/nonexistent.toml")).unwrap();
    clear_env();
    assert!(config.secrets.llm_api_key.is_none());
}

#[test]
fn secrets_are_redacted_in_debug() {
    let mut config = Config::default();
    config.secrets.llm_api_key = Some(Secret::new("gsk-very-secret"));
    let debug = format!("{config:?}");
    assert!(!debug.contains("gsk-very-secret"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn validate_rejects_candidates_below_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 10;
    config.retrieval.rerank_candidates = 5;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("rerank_candidates"));
}

#[test]
fn validate_rejects_overlap_not_below_chunk_size() {
    let mut config = Config::default();
    config.retrieval.chunk_overlap = config.retrieval.chunk_size;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_template_without_placeholders() {
    let mut config = Config::default();
    config.prompt.template = "Answer {query_str}".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("{context_str}"));
}

#[test]
fn validate_rejects_empty_extensions() {
    let mut config = Config::default();
    config.repos.extensions = vec![String::new()];
    assert!(config.validate().is_err());
}

#[test]
fn serializes_without_secrets() {
    let mut config = Config::default();
    config.secrets.llm_api_key = Some(Secret::new("gsk-hidden"));
    let toml = toml::to_string(&config).unwrap();
    assert!(!toml.contains("gsk-hidden"));
    assert!(toml.contains("llama3-70b-8192"));
}
