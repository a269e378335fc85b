mod notebook;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::path::{Path, PathBuf};

pub use notebook::NotebookLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::{DocumentError, DocumentMetadata};

/// Canonicalize `path` and reject it when it exceeds `max_size` bytes.
async fn open_checked(path: &Path, max_size: u64) -> Result<PathBuf, DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(path)
}

/// Metadata for a file loaded on its own. The directory reader replaces
/// `file_path` with the repository-relative path.
fn metadata_for(path: &Path, content_type: &str) -> DocumentMetadata {
    DocumentMetadata {
        source: path.display().to_string(),
        file_path: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: content_type.to_owned(),
    }
}
