#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Absolute path of the file the text came from.
    pub source: String,
    /// Path relative to the repository root, `/`-separated.
    pub file_path: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
}
