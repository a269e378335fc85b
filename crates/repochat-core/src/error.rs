use std::path::PathBuf;

use repochat_index::IndexError;
use repochat_llm::LlmError;

use crate::channel::ChannelError;

/// Why answering a question failed.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid GitHub repository URL: {0}")]
    InvalidUrl(String),

    #[error("git clone failed: {0}")]
    Clone(String),

    #[error("clone reported success but {} does not exist", .0.display())]
    AcquisitionInconsistency(PathBuf),

    #[error("no documents found in {}", .0.display())]
    EmptyRepository(PathBuf),

    #[error("index build failed: {0}")]
    IndexBuild(#[source] IndexError),

    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    #[error("no repository loaded")]
    NotLoaded,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Load failures that are reported as information rather than errors.
    #[must_use]
    pub fn is_empty_repository(&self) -> bool {
        matches!(self, Self::EmptyRepository(_))
    }
}
