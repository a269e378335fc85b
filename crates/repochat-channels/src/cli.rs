use std::collections::VecDeque;
use std::io::{Write, stderr, stdout};

use repochat_core::channel::{Channel, ChannelError, ChannelMessage};

use crate::line_editor::{self, ReadLineResult};

const PROMPT: &str = "You: ";
const ANSWER_PREFIX: &str = "Assistant: ";
const HISTORY_LIMIT: usize = 500;

/// In-memory input history for the line editor. Not persisted.
#[derive(Debug, Default)]
struct InputHistory {
    entries: VecDeque<String>,
}

impl InputHistory {
    fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    fn add(&mut self, line: &str) {
        if line.is_empty() || self.entries.back().is_some_and(|last| last == line) {
            return;
        }
        if self.entries.len() == HISTORY_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_owned());
    }
}

/// Terminal channel: questions on stdin, answers streamed to stdout,
/// progress on stderr.
#[derive(Debug, Default)]
pub struct CliChannel {
    history: InputHistory,
    answering: bool,
}

impl CliChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for CliChannel {
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        loop {
            let entries = self.history.snapshot();
            let result = tokio::task::spawn_blocking(move || line_editor::read_line(PROMPT, &entries))
                .await
                .map_err(|e| ChannelError::Other(e.to_string()))?
                .map_err(ChannelError::Io)?;

            let line = match result {
                ReadLineResult::Interrupted => {
                    tracing::debug!("input interrupted");
                    return Ok(None);
                }
                ReadLineResult::Eof => {
                    tracing::debug!("input closed");
                    return Ok(None);
                }
                ReadLineResult::Line(l) => l,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.history.add(trimmed);
            return Ok(Some(ChannelMessage {
                text: trimmed.to_owned(),
            }));
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut out = stdout().lock();
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: &str) -> Result<(), ChannelError> {
        let mut out = stdout().lock();
        if !self.answering {
            write!(out, "{ANSWER_PREFIX}")?;
            self.answering = true;
        }
        write!(out, "{chunk}")?;
        out.flush()?;
        Ok(())
    }

    async fn flush_chunks(&mut self) -> Result<(), ChannelError> {
        if self.answering {
            println!();
            self.answering = false;
        }
        Ok(())
    }

    async fn send_status(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut err = stderr().lock();
        writeln!(err, "{text}")?;
        err.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_skips_empty_and_consecutive_duplicates() {
        let mut h = InputHistory::default();
        h.add("");
        h.add("/load https://github.com/a/b");
        h.add("/load https://github.com/a/b");
        h.add("why?");
        h.add("/load https://github.com/a/b");
        assert_eq!(
            h.snapshot(),
            vec![
                "/load https://github.com/a/b",
                "why?",
                "/load https://github.com/a/b"
            ]
        );
    }

    #[test]
    fn history_is_bounded() {
        let mut h = InputHistory::default();
        for i in 0..=HISTORY_LIMIT {
            h.add(&format!("q{i}"));
        }
        let entries = h.snapshot();
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0], "q1");
    }

    #[tokio::test]
    async fn answer_prefix_printed_once_per_answer() {
        let mut ch = CliChannel::new();
        ch.send_chunk("Hel").await.unwrap();
        assert!(ch.answering);
        ch.send_chunk("lo").await.unwrap();
        ch.flush_chunks().await.unwrap();
        assert!(!ch.answering);
    }

    #[tokio::test]
    async fn flush_without_chunks_is_noop() {
        let mut ch = CliChannel::new();
        ch.flush_chunks().await.unwrap();
        assert!(!ch.answering);
    }

    #[tokio::test]
    async fn send_and_status_succeed() {
        let mut ch = CliChannel::default();
        ch.send("Data loaded successfully!").await.unwrap();
        ch.send_status("Loading widgets repository by acme...")
            .await
            .unwrap();
    }
}
