//! Chat-with-a-repository core: acquisition, query engine, session and app loop.

pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod query;
pub mod repo;
pub mod secret;
pub mod session;
pub mod template;

pub use app::App;
pub use channel::{Channel, ChannelError, ChannelMessage};
pub use config::Config;
pub use error::{ChatError, QueryError};
pub use query::QueryEngine;
pub use repo::{GitCli, GitCloner, RepoSlug, RepositoryAcquirer};
pub use session::{ChatTurn, Session};
pub use template::PromptTemplate;
