use std::path::Path;
use std::pin::Pin;

use serde::Deserialize;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{metadata_for, open_checked};

/// Jupyter notebook loader. Keeps markdown and code cell sources, drops outputs.
pub struct NotebookLoader {
    pub max_file_size: u64,
}

impl Default for NotebookLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Deserialize)]
struct Cell {
    #[serde(default)]
    source: CellSource,
}

/// nbformat allows either a single string or a list of lines.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            Self::Lines(lines) => lines.concat(),
            Self::Text(text) => text,
        }
    }
}

fn notebook_text(raw: &[u8]) -> Result<String, DocumentError> {
    let notebook: Notebook = serde_json::from_slice(raw)?;
    let cells: Vec<String> = notebook
        .cells
        .into_iter()
        .map(|c| c.source.into_text())
        .filter(|s| !s.trim().is_empty())
        .collect();
    Ok(cells.join("\n\n"))
}

impl DocumentLoader for NotebookLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = open_checked(&path, max_size).await?;
            let raw = tokio::fs::read(&path).await?;
            let content = notebook_text(&raw)?;

            Ok(vec![Document {
                content,
                metadata: metadata_for(&path, "application/x-ipynb+json"),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["ipynb"]
    }
}
