//! Filesystem collaborators: directory walking and content hashing.
//!
//! The engine core never touches the filesystem itself; it consumes the
//! `(path, size)` sequence produced by [`walker::Walker`] and the digests
//! produced by [`hasher::digest_file`], both delivered back to it as
//! events.

pub mod hasher;
pub mod walker;

use std::path::PathBuf;

pub use hasher::digest_file;
pub use walker::Walker;

/// Errors from a single hash computation. Recoverable: a bad file is
/// reported per path and never aborts the rest of the index.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file disappeared between discovery and hashing.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O error while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}
