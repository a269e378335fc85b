use std::path::PathBuf;

use super::{Config, ProviderKind};
use crate::secret::Secret;

fn parse_provider(var: &str, value: &str) -> Option<ProviderKind> {
    match serde_json::from_value(serde_json::Value::String(value.to_owned())) {
        Ok(kind) => Some(kind),
        Err(_) => {
            tracing::warn!("ignoring invalid {var} value: {value}");
            None
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_LLM_PROVIDER")
            && let Some(kind) = parse_provider("REPOCHAT_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_provider("REPOCHAT_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOCHAT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_RERANKER_BASE_URL") {
            self.reranker.base_url = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("REPOCHAT_RERANKER_MODEL") {
            self.reranker.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_RETRIEVAL_TOP_K") {
            match v.parse::<usize>() {
                Ok(k) => self.retrieval.top_k = k,
                Err(_) => tracing::warn!("ignoring invalid REPOCHAT_RETRIEVAL_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("REPOCHAT_REPOS_DIR") {
            self.repos.dir = PathBuf::from(v);
        }

        self.apply_env_secrets();
    }

    fn apply_env_secrets(&mut self) {
        if let Some(key) = non_empty("REPOCHAT_LLM_API_KEY").or_else(|| non_empty("GROQ_API_KEY")) {
            self.secrets.llm_api_key = Some(Secret::new(key));
        }
        if let Some(key) = non_empty("REPOCHAT_EMBEDDING_API_KEY") {
            self.secrets.embedding_api_key = Some(Secret::new(key));
        }
    }
}
