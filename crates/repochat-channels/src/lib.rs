//! Frontends for the repochat app loop.

pub mod cli;
mod line_editor;

pub use cli::CliChannel;
