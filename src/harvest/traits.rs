//! Core types for metadata extraction.
//!
//! - [`MetadataDocument`]: the single text a dependency listing is read from
//! - [`ExtractedEntry`]: a metadata file written to the working directory
//! - Standardized error handling for extraction and cleanup

use crate::parser::MetadataKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Metadata Structures
// ============================================================================

/// Dependency metadata pulled out of an artifact.
#[derive(Debug)]
pub struct MetadataDocument {
    /// Which document format `text` follows
    pub kind: MetadataKind,

    /// Archive member the text was read from
    pub member: String,

    /// Decoded contents (invalid UTF-8 replaced)
    pub text: String,

    /// Present when the member was also written to disk
    pub extracted: Option<ExtractedEntry>,
}

/// A metadata file extracted from a zip artifact into the working directory.
///
/// Cleanup removes the file, then the directory named by the member's first
/// path segment. Only that one directory is removed, and only when empty,
/// so members nested deeper leave intermediate directories behind.
#[derive(Debug)]
pub struct ExtractedEntry {
    /// Extracted file
    pub path: PathBuf,

    /// Top-level directory created for it (e.g., `demo-1.0.dist-info`)
    pub top_dir: Option<PathBuf>,
}

impl ExtractedEntry {
    /// Removes the extracted file and its top-level directory.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError`] if either removal fails.
    pub fn cleanup(self) -> Result<(), CleanupError> {
        std::fs::remove_file(&self.path).map_err(|source| CleanupError {
            path: self.path.clone(),
            source,
        })?;

        if let Some(dir) = self.top_dir {
            std::fs::remove_dir(&dir).map_err(|source| CleanupError { path: dir, source })?;
        }
        Ok(())
    }
}

/// Resolves an archive member path against `root`, rejecting any path that
/// would escape it (absolute paths, `..` components).
///
/// # Errors
///
/// Returns [`ExtractionError::UnsafePath`] for escaping paths.
pub fn safe_child(root: &Path, relative: &Path) -> Result<PathBuf, ExtractionError> {
    for component in relative.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractionError::UnsafePath(relative.display().to_string()));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(root.join(relative))
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading metadata out of an artifact.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Artifact could not be read as a zip container
    #[error("Failed to read zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Generic I/O error (including corrupt compressed streams)
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),

    /// Member path would escape the working directory
    #[error("Archive member escapes working directory: '{0}'")]
    UnsafePath(String),
}

/// Failure to remove an extracted metadata file or its directory.
#[derive(Error, Debug)]
#[error("Failed to remove '{}': {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

// ============================================================================
// Tests
// ============================================================================
