//! Filesystem-backed document source.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::resolve_with_base;
use crate::error::{Error, Result};
use crate::traits::DocumentSource;

const DOCUMENT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Serves documents from a directory. A page reference is a path relative to
/// the root (absolute paths, `~` and `$VAR` are honoured as well).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative references of every document under the root, sorted.
    pub fn list_documents(&self) -> Vec<String> {
        let mut docs: Vec<String> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
            })
            .map(|e| {
                let rel = e.path().strip_prefix(&self.root).unwrap_or(e.path());
                rel.to_string_lossy().replace('\\', "/")
            })
            .collect();
        docs.sort();
        docs
    }
}

impl DocumentSource for DirectorySource {
    fn get_page_as_text(&self, page_reference: &str) -> Result<String> {
        let path = resolve_with_base(&self.root, page_reference);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::debug!(path = %path.display(), "not valid UTF-8, decoding lossily");
                fs::read(&path)
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .map_err(|e| Error::fetch(page_reference, e))
            }
            Err(e) => Err(Error::fetch(page_reference, format!("{}: {e}", path.display()))),
        }
    }
}
