//! Input resolution: validate a PDF path and load its bytes.
//!
//! The PDF magic bytes (`%PDF`) are checked before anything is sent to a
//! provider, so a mistyped path to a `.docx` fails locally with a clear
//! message instead of as an opaque API rejection.

use crate::error::ReviewError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated PDF held in memory.
#[derive(Clone)]
pub struct PdfDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl PdfDocument {
    /// Wrap in-memory bytes, validating the PDF header.
    ///
    /// `name` is used for error messages and as the document title sent to
    /// the provider.
    pub fn from_bytes(name: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, ReviewError> {
        let path = name.into();
        check_magic(&path, &bytes)?;
        Ok(Self { path, bytes })
    }

    /// File name without directories, for titles and logs.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Validate a local PDF path and read it into memory.
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<PdfDocument, ReviewError> {
    let path = path.as_ref().to_path_buf();
    validate_local(&path)?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ReviewError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
    debug!("Loaded PDF {} ({} bytes)", path.display(), bytes.len());
    PdfDocument::from_bytes(path, bytes)
}

/// Check existence, readability and PDF magic bytes without reading the whole file.
fn validate_local(path: &Path) -> Result<(), ReviewError> {
    if !path.exists() {
        return Err(ReviewError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut head = Vec::with_capacity(4);
            f.by_ref()
                .take(4)
                .read_to_end(&mut head)
                .map_err(|e| ReviewError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            check_magic(path, &head)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ReviewError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(ReviewError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), ReviewError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ReviewError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}
