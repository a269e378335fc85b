use super::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    /// Split a document into chunks of roughly `chunk_size` bytes.
    ///
    /// Whitespace-only documents produce no chunks.
    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.content;
        if text.trim().is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size.max(1);
        let pieces = if self.config.sentence_aware {
            let units: Vec<String> = split_sentences(text)
                .into_iter()
                .flat_map(|s| split_oversized(s, size))
                .collect();
            merge_sentences(&units, size, self.config.chunk_overlap)
        } else {
            split_chars(text, size, self.config.chunk_overlap)
        };

        pieces
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        current.push(chars[i]);

        // paragraph break; in source files this separates top-level blocks
        if chars[i] == '\n' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            current.push(chars[i + 1]);
            i += 1;
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        } else if matches!(chars[i], '.' | '?' | '!')
            && i + 1 < chars.len()
            && chars[i + 1] == ' '
            && !current.trim().is_empty()
        {
            sentences.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Break a unit longer than `chunk_size` on line boundaries, and lines that are
/// still too long on char boundaries.
fn split_oversized(unit: String, chunk_size: usize) -> Vec<String> {
    if unit.len() <= chunk_size {
        return vec![unit];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for line in unit.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > chunk_size {
            out.push(std::mem::take(&mut current));
        }
        if line.len() > chunk_size {
            out.extend(split_bytes(line, chunk_size));
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Pieces of at most `max_bytes` bytes (at least one char each) cut on char boundaries.
fn split_bytes(text: &str, max_bytes: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if !current.is_empty() && current.len() + c.len_utf8() > max_bytes {
            out.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Merge sentences into chunks, respecting size and overlap.
fn merge_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && current.len() + sentence.len() > chunk_size {
            chunks.push(std::mem::take(&mut current));

            // carry trailing sentences of the previous chunk as overlap
            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if overlap_len + sentences[i].len() > chunk_overlap {
                    break;
                }
                overlap_len += sentences[i].len();
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            window_start = overlap_start;
        }

        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
