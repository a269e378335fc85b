use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{metadata_for, open_checked};

/// Reads source and markdown files as UTF-8, replacing invalid sequences.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "md" | "markdown" => "text/markdown",
        "py" => "text/x-python",
        "js" | "mjs" | "cjs" => "text/javascript",
        "ts" | "tsx" => "text/typescript",
        _ => "text/plain",
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = open_checked(&path, max_size).await?;

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let content_type = content_type_for(ext);

            let bytes = tokio::fs::read(&path).await?;
            let content = String::from_utf8_lossy(&bytes).into_owned();

            Ok(vec![Document {
                content,
                metadata: metadata_for(&path, content_type),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["py", "js", "ts", "md", "markdown", "txt"]
    }
}
