mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::template;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str::<Self>(&content)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be > 0".into()));
        }
        if r.rerank_candidates < r.top_k {
            return Err(ConfigError::Invalid(format!(
                "retrieval.rerank_candidates ({}) must be >= retrieval.top_k ({})",
                r.rerank_candidates, r.top_k
            )));
        }
        if r.chunk_size == 0 || r.chunk_overlap >= r.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        template::validate(&self.prompt.template)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.repos.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "repos.extensions must list at least one extension".into(),
            ));
        }
        Ok(())
    }
}
