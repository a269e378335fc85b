use std::io::{self, BufRead, IsTerminal, Write, stdout};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, ClearType},
};

#[derive(Debug, PartialEq, Eq)]
pub enum ReadLineResult {
    Line(String),
    Interrupted,
    Eof,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Edit state of one prompt: text, cursor (in chars) and history position.
#[derive(Debug, Default)]
struct LineBuffer {
    input: String,
    cursor: usize,
    history_index: Option<usize>,
    draft: String,
}

enum KeyOutcome {
    Continue,
    Done(ReadLineResult),
}

impl LineBuffer {
    fn apply(&mut self, key: KeyEvent, history: &[String]) -> KeyOutcome {
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                return KeyOutcome::Done(ReadLineResult::Interrupted);
            }
            (KeyModifiers::CONTROL, KeyCode::Char('d')) if self.input.is_empty() => {
                return KeyOutcome::Done(ReadLineResult::Eof);
            }
            (_, KeyCode::Enter) => {
                return KeyOutcome::Done(ReadLineResult::Line(std::mem::take(&mut self.input)));
            }
            (KeyModifiers::CONTROL, KeyCode::Char('a')) | (_, KeyCode::Home) => self.cursor = 0,
            (KeyModifiers::CONTROL, KeyCode::Char('e')) | (_, KeyCode::End) => {
                self.cursor = char_count(&self.input);
            }
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
                self.input.clear();
                self.cursor = 0;
            }
            (KeyModifiers::ALT, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
                let boundary = prev_word_boundary(&self.input, self.cursor);
                let start = byte_offset(&self.input, boundary);
                let end = byte_offset(&self.input, self.cursor);
                self.input.drain(start..end);
                self.cursor = boundary;
            }
            (_, KeyCode::Backspace) if self.cursor > 0 => {
                self.input.remove(byte_offset(&self.input, self.cursor - 1));
                self.cursor -= 1;
            }
            (_, KeyCode::Delete) if self.cursor < char_count(&self.input) => {
                self.input.remove(byte_offset(&self.input, self.cursor));
            }
            (_, KeyCode::Left) => self.cursor = self.cursor.saturating_sub(1),
            (_, KeyCode::Right) if self.cursor < char_count(&self.input) => self.cursor += 1,
            (_, KeyCode::Up) => self.history_up(history),
            (_, KeyCode::Down) => self.history_down(history),
            (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
                self.input.insert(byte_offset(&self.input, self.cursor), c);
                self.cursor += 1;
            }
            _ => {}
        }
        KeyOutcome::Continue
    }

    /// Older entry starting with the text typed before navigation began.
    fn history_up(&mut self, history: &[String]) {
        let end = match self.history_index {
            None => {
                self.draft.clone_from(&self.input);
                history.len()
            }
            Some(i) => i,
        };
        let prefix = self.draft.as_str();
        let Some(idx) = history[..end].iter().rposition(|e| e.starts_with(prefix)) else {
            return;
        };
        self.history_index = Some(idx);
        self.input.clone_from(&history[idx]);
        self.cursor = char_count(&self.input);
    }

    fn history_down(&mut self, history: &[String]) {
        let Some(i) = self.history_index else { return };
        let prefix = self.draft.as_str();
        match history[i + 1..].iter().position(|e| e.starts_with(prefix)) {
            Some(offset) => {
                self.history_index = Some(i + 1 + offset);
                self.input.clone_from(&history[i + 1 + offset]);
            }
            None => {
                self.history_index = None;
                self.input = std::mem::take(&mut self.draft);
            }
        }
        self.cursor = char_count(&self.input);
    }
}

/// Read one line with editing and history when stdin is a terminal,
/// or a plain buffered line when input is piped.
pub fn read_line(prompt: &str, history: &[String]) -> io::Result<ReadLineResult> {
    if !io::stdin().is_terminal() {
        return read_piped_line(prompt);
    }

    let _guard = RawModeGuard::enter()?;
    let mut buf = LineBuffer::default();
    render(prompt, &buf)?;

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if let KeyOutcome::Done(result) = buf.apply(key, history) {
            write!(stdout(), "\r\n")?;
            stdout().flush()?;
            return Ok(result);
        }
        render(prompt, &buf)?;
    }
}

fn read_piped_line(prompt: &str) -> io::Result<ReadLineResult> {
    let mut out = stdout();
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        writeln!(out)?;
        return Ok(ReadLineResult::Eof);
    }
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(ReadLineResult::Line(line))
}

fn render(prompt: &str, buf: &LineBuffer) -> io::Result<()> {
    let mut out = stdout();
    let before_cursor: String = buf.input.chars().take(buf.cursor).collect();
    let col = display_width(prompt) + display_width(&before_cursor);
    write!(
        out,
        "\r{}{}{}{}",
        terminal::Clear(ClearType::CurrentLine),
        prompt,
        buf.input,
        cursor::MoveToColumn(u16::try_from(col).unwrap_or(u16::MAX)),
    )?;
    out.flush()
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

fn prev_word_boundary(s: &str, cursor: usize) -> usize {
    let chars: Vec<char> = s.chars().collect();
    let mut i = cursor;
    while i > 0 && !chars[i - 1].is_alphanumeric() {
        i -= 1;
    }
    while i > 0 && chars[i - 1].is_alphanumeric() {
        i -= 1;
    }
    i
}

fn display_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}
