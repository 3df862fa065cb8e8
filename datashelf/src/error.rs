//! Error types for dataset manifest and transfer operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for datashelf operations.
pub type ShelfResult<T> = Result<T, ShelfError>;

/// Integrity violations detected after a transfer completed.
///
/// These are never recovered locally: a mismatch means either a corrupted
/// source object or a manifest that disagrees with the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// SHA-256 of the received bytes differs from the manifest.
    #[error("checksum mismatch for {}: expected {expected} got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Number of received bytes differs from the manifest.
    #[error("size mismatch for {}: expected {expected} bytes got {actual}", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Errors that can occur while building, presigning or transferring datasets.
#[derive(Debug, Error)]
pub enum ShelfError {
    /// Manifest file or dataset directory is missing.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// Network-layer failure for a single object.
    #[error("transport error for {address}: {reason}")]
    Transport { address: String, reason: String },

    /// Checksum or size mismatch.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Object store credentials or endpoint are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Local filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// A manifest or index file could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Object store request failed outside of a per-file transfer.
    #[error("object store error: {0}")]
    Store(String),
}

impl ShelfError {
    /// Shorthand for wrapping an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error must abort a batch.
    ///
    /// Only transport failures are recovered per entry.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transport { .. })
    }
}
