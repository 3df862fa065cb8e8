//! Single-file transfer with rolling hash and atomic placement.
//!
//! Bytes are streamed into `<destination>.<pid>-<seq>.part` and renamed over
//! the destination only after verification, so a failed transfer never
//! leaves a half-written file at the destination path. The sequence number
//! keeps concurrent transfers from sharing a partial file, even when one
//! entry's destination is another entry's `<name>.part`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use super::observer::TransferObserver;
use crate::checksum::BUFFER_SIZE;
use crate::error::{IntegrityError, ShelfError};
use crate::store::{Fetcher, TransportError};

/// Suffix of in-progress downloads.
pub const PARTIAL_SUFFIX: &str = ".part";

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Failure of one transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Opening or reading the source failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Received bytes do not match the manifest.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Local filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl From<TransferError> for ShelfError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Transport(t) => t.into(),
            TransferError::Integrity(i) => ShelfError::Integrity(i),
            TransferError::Io { path, source } => ShelfError::Io { path, source },
        }
    }
}

/// One fetch to perform.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub address: &'a str,
    pub destination: &'a Path,
    pub expected_hash: Option<&'a str>,
    pub expected_size: Option<u64>,
    /// Check hash and size before placing the file.
    pub verify: bool,
}

/// What a successful transfer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub bytes_transferred: u64,
    pub observed_hash: String,
}

/// Streams fetched objects to disk.
#[derive(Clone)]
pub struct TransferExecutor {
    fetcher: Arc<dyn Fetcher>,
    buffer_size: usize,
}

impl TransferExecutor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            buffer_size: BUFFER_SIZE,
        }
    }

    /// Override the copy buffer size (minimum 1 byte).
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Fetch `request.address` into `request.destination`.
    ///
    /// # Errors
    ///
    /// `Transport` for network failures, `Integrity` when verification is on
    /// and the bytes disagree with the manifest, `Io` for local failures. In
    /// every error case the partial file has been removed.
    pub fn transfer(
        &self,
        request: &TransferRequest<'_>,
        observer: &dyn TransferObserver,
    ) -> Result<TransferOutcome, TransferError> {
        let destination = request.destination;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| TransferError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let stream = self.fetcher.fetch(request.address)?;

        let partial = partial_path(destination, PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed));
        let result = self
            .stream_to(stream, &partial, request.address, observer)
            .and_then(|outcome| {
                if request.verify {
                    verify(request, &outcome)?;
                }
                fs::rename(&partial, destination).map_err(|source| TransferError::Io {
                    path: destination.to_path_buf(),
                    source,
                })?;
                Ok(outcome)
            });

        if result.is_err() {
            remove_partial(&partial);
        }

        let outcome = result?;
        debug!(
            destination = %destination.display(),
            bytes = outcome.bytes_transferred,
            "Transfer complete"
        );
        Ok(outcome)
    }

    fn stream_to(
        &self,
        mut stream: Box<dyn Read + Send>,
        partial: &Path,
        address: &str,
        observer: &dyn TransferObserver,
    ) -> Result<TransferOutcome, TransferError> {
        let io_error = |source: io::Error| TransferError::Io {
            path: partial.to_path_buf(),
            source,
        };

        let file = File::create(partial).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut transferred = 0u64;

        loop {
            let bytes_read = match stream.read(&mut buffer) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TransportError::new(address, format!("read error: {}", e)).into())
                }
            };

            if bytes_read == 0 {
                break;
            }

            writer.write_all(&buffer[..bytes_read]).map_err(io_error)?;
            hasher.update(&buffer[..bytes_read]);
            transferred += bytes_read as u64;
            observer.on_bytes_transferred(bytes_read as u64);
        }

        writer.flush().map_err(io_error)?;

        Ok(TransferOutcome {
            bytes_transferred: transferred,
            observed_hash: format!("{:x}", hasher.finalize()),
        })
    }
}

/// `<destination>.<pid>-<seq>.part`, next to the destination.
pub fn partial_path(destination: &Path, seq: u64) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(format!(".{}-{}{}", process::id(), seq, PARTIAL_SUFFIX));
    destination.with_file_name(name)
}

fn verify(
    request: &TransferRequest<'_>,
    outcome: &TransferOutcome,
) -> Result<(), IntegrityError> {
    if let Some(expected) = request.expected_hash {
        if !expected.eq_ignore_ascii_case(&outcome.observed_hash) {
            return Err(IntegrityError::ChecksumMismatch {
                path: request.destination.to_path_buf(),
                expected: expected.to_string(),
                actual: outcome.observed_hash.clone(),
            });
        }
    }

    if let Some(expected) = request.expected_size {
        if expected != outcome.bytes_transferred {
            return Err(IntegrityError::SizeMismatch {
                path: request.destination.to_path_buf(),
                expected,
                actual: outcome.bytes_transferred,
            });
        }
    }

    Ok(())
}

fn remove_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "Failed to remove partial file"),
    }
}
