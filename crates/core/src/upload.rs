//! Uploaded input files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stem used when the client-supplied name has nothing usable in it.
const FALLBACK_STEM: &str = "upload";

/// A file received from a client and stored on local disk.
///
/// The file is deleted when this value is dropped, whatever happened to the
/// request that produced it.
#[derive(Debug)]
pub struct UploadedFile {
    path: PathBuf,
    original_name: String,
    mime_type: Option<String>,
    size: u64,
}

impl UploadedFile {
    pub fn new(
        path: PathBuf,
        original_name: impl Into<String>,
        mime_type: Option<String>,
        size: u64,
    ) -> Self {
        Self {
            path,
            original_name: original_name.into(),
            mime_type,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The client's file name without directory or extension, restricted to
    /// characters safe to use in generated file names.
    pub fn file_stem(&self) -> String {
        let stem: String = Path::new(&self.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let stem = stem.trim_matches('.');
        if stem.is_empty() {
            FALLBACK_STEM.to_string()
        } else {
            stem.to_string()
        }
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uploaded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove uploaded file"),
        }
    }
}
