//! Already-extracted documents and the loader that reads them from disk.

use crate::index::compute_content_hash;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Errors raised while reading documents from disk.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Path does not exist.
    #[error("document path {0} does not exist")]
    NotFound(PathBuf),
    /// File exists but is not a supported text format.
    #[error("unsupported document type: {0}")]
    Unsupported(PathBuf),
    /// Reading a file or walking a directory failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Text of one source document, ready for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Identifier stored with every chunk of the document.
    pub source: String,
    /// Extracted text or markdown.
    pub text: String,
}

impl Document {
    /// Create a document from a source identifier and its text.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// SHA-256 of the document text.
    pub fn content_hash(&self) -> String {
        compute_content_hash(&self.text)
    }
}

/// Load a single file, or every supported file below a directory sorted by file name.
///
/// The source identifier is the file name.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    if path.is_file() {
        if !is_supported(path) {
            return Err(DocumentError::Unsupported(path.to_path_buf()));
        }
        return Ok(vec![read_document(path)?]);
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|error| DocumentError::Io {
            path: error
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.to_path_buf()),
            source: error.into(),
        })?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            documents.push(read_document(entry.path())?);
        }
    }
    tracing::debug!(path = %path.display(), documents = documents.len(), "Loaded documents");
    Ok(documents)
}

fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(source, text))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| extension.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}
