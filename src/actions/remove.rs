//! The file-removal collaborator.
//!
//! # Overview
//!
//! The engine decides *whether* a file may be deleted (safe mode, last
//! surviving copy); this module only carries the removal out. The default
//! implementation moves files to the system trash so mistakes are
//! recoverable; [`PermanentRemover`] deletes outright and exists mainly
//! for environments without a trash (and for tests).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for removal operations.
#[derive(Debug, Error)]
pub enum RemoveError {
    /// File was not found (may already have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Removes one file. Implementations must be callable from background
/// workers.
pub trait FileRemover: Send + Sync {
    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoveError`] when the file is missing or cannot be
    /// removed.
    fn remove(&self, path: &Path) -> Result<(), RemoveError>;
}

/// Moves files to the system trash (recoverable).
#[derive(Debug, Default)]
pub struct TrashRemover;

impl FileRemover for TrashRemover {
    fn remove(&self, path: &Path) -> Result<(), RemoveError> {
        if !path.exists() {
            return Err(RemoveError::NotFound(path.to_path_buf()));
        }
        trash::delete(path).map_err(|e| RemoveError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::info!("moved to trash: {}", path.display());
        Ok(())
    }
}

/// Deletes files permanently via `std::fs`.
#[derive(Debug, Default)]
pub struct PermanentRemover;

impl FileRemover for PermanentRemover {
    fn remove(&self, path: &Path) -> Result<(), RemoveError> {
        std::fs::remove_file(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RemoveError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => RemoveError::PermissionDenied(path.to_path_buf()),
            _ => RemoveError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        log::info!("deleted permanently: {}", path.display());
        Ok(())
    }
}
