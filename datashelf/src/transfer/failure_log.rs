//! Append-only log of per-entry transport failures.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{ShelfError, ShelfResult};

/// Default file name for download failures, inside the destination root.
pub const DOWNLOAD_FAILURE_LOG: &str = "failed_downloads.log";

/// One `FAILED: <path> - <cause>` line per failed entry.
///
/// Each append opens, writes and closes the file under a mutex, so lines
/// from concurrent workers never interleave and the log survives a crash.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failure line.
    pub fn append(&self, relative_path: &str, cause: &str) -> ShelfResult<()> {
        let line = format_line(relative_path, cause);
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ShelfError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ShelfError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ShelfError::io(&self.path, e))
    }
}

/// Format one log line; newlines in the cause are flattened.
pub fn format_line(relative_path: &str, cause: &str) -> String {
    let cause = cause.replace(['\r', '\n'], " ");
    format!("FAILED: {} - {}\n", relative_path, cause.trim())
}
