//! Recursive repository reader: walk → filter by extension → per-format loader.

use std::path::{Path, PathBuf};

use super::loader::{NotebookLoader, TextLoader};
#[cfg(feature = "pdf")]
use super::loader::PdfLoader;
use super::{DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};

/// Reads every file under a directory whose extension is in the allow-list.
///
/// Hidden entries (`.git`, dotfiles) are skipped. Ignore files are not
/// consulted, so what gets loaded does not depend on the repository's own
/// `.gitignore`. Files come back sorted by path.
pub struct DirectoryReader {
    extensions: Vec<String>,
    recursive: bool,
    text: TextLoader,
    notebook: NotebookLoader,
    #[cfg(feature = "pdf")]
    pdf: PdfLoader,
}

impl Default for DirectoryReader {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl DirectoryReader {
    /// Extensions are matched case-insensitively; a leading `.` is ignored.
    #[must_use]
    pub fn new<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            extensions,
            recursive: true,
            text: TextLoader::default(),
            notebook: NotebookLoader::default(),
            #[cfg(feature = "pdf")]
            pdf: PdfLoader::default(),
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.text.max_file_size = bytes;
        self.notebook.max_file_size = bytes;
        #[cfg(feature = "pdf")]
        {
            self.pdf.max_file_size = bytes;
        }
        self
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Files under `root` that pass the extension filter, sorted by path.
    #[must_use]
    pub fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut builder = ignore::WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false);
        if !self.recursive {
            builder.max_depth(Some(1));
        }

        let mut files: Vec<PathBuf> = builder
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| self.matches(p))
            .collect();
        files.sort();
        files
    }

    /// Load all matching files under `root`.
    ///
    /// Files that fail to load are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Io` if `root` is not a readable directory and
    /// `DocumentError::NoDocuments` if nothing could be loaded.
    pub async fn load(&self, root: &Path) -> Result<Vec<Document>, DocumentError> {
        let meta = tokio::fs::metadata(root).await?;
        if !meta.is_dir() {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }

        let files = self.collect_files(root);
        tracing::info!(
            root = %root.display(),
            files = files.len(),
            "loading documents"
        );

        let mut documents = Vec::with_capacity(files.len());
        let mut skipped = 0usize;
        let mut blank = 0usize;

        for path in &files {
            let rel_path = relative_path(root, path);
            match self.load_file(path).await {
                Ok(docs) => {
                    for mut doc in docs {
                        if doc.content.trim().is_empty() {
                            blank += 1;
                            tracing::debug!(file = %rel_path, "skipping blank file");
                            continue;
                        }
                        doc.metadata.file_path.clone_from(&rel_path);
                        documents.push(doc);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(file = %rel_path, error = %e, "skipping file");
                }
            }
        }

        tracing::info!(
            documents = documents.len(),
            skipped,
            blank,
            "documents loaded"
        );

        if documents.is_empty() {
            return Err(DocumentError::NoDocuments(root.to_path_buf()));
        }
        Ok(documents)
    }

    /// Dispatch on the loader that lists the extension; anything else is read
    /// as plain text.
    async fn load_file(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let handles =
            |loader: &dyn DocumentLoader| loader.supported_extensions().contains(&ext.as_str());

        if handles(&self.notebook) {
            return self.notebook.load(path).await;
        }
        #[cfg(feature = "pdf")]
        if handles(&self.pdf) {
            return self.pdf.load(path).await;
        }
        #[cfg(not(feature = "pdf"))]
        if ext == "pdf" {
            return Err(DocumentError::UnsupportedFormat(
                "pdf (built without the `pdf` feature)".into(),
            ));
        }
        self.text.load(path).await
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
