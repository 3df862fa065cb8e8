//! Manifest-driven uploads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::destination::destination_path;
use super::failure_log::FailureLog;
use super::observer::{NoopObserver, TransferObserver};
use super::policy::{decide_upload, Decision};
use super::result::{BatchCounters, BatchResult, EntryOutcome};
use crate::checksum::calculate_file_digests;
use crate::error::{ShelfError, ShelfResult};
use crate::layout::DatasetLayout;
use crate::manifest::{read_manifest, write_manifest, ContentHash, FileEntry};
use crate::store::ObjectStore;

/// Options for one upload run.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Backfill pending hashes and rewrite the manifest.
    pub update_manifest: bool,
    /// Defaults to `<manifests_dir>/<name>.upload_failures.log`.
    pub failure_log: Option<PathBuf>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            update_manifest: true,
            failure_log: None,
        }
    }
}

impl UploadOptions {
    pub fn with_update_manifest(mut self, update_manifest: bool) -> Self {
        self.update_manifest = update_manifest;
        self
    }

    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = Some(path.into());
        self
    }
}

/// Pushes dataset files to an object store.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    observer: Arc<dyn TransferObserver>,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Upload every file of dataset `name` listed in its manifest.
    ///
    /// Objects already present with the expected size are skipped. Missing
    /// local files are skipped with a warning. Failed requests are logged
    /// and counted; the run continues.
    ///
    /// # Errors
    ///
    /// `NotFound` if the manifest or dataset directory is missing, and any
    /// non-transport error from the store or local filesystem.
    pub fn upload_dataset(
        &self,
        layout: &DatasetLayout,
        name: &str,
        options: &UploadOptions,
    ) -> ShelfResult<BatchResult> {
        let manifest_path = layout.manifest_path(name);
        let mut manifest = read_manifest(&manifest_path)?;

        let dataset_dir = layout.dataset_dir(name);
        if !dataset_dir.is_dir() {
            return Err(ShelfError::NotFound {
                what: "dataset directory",
                path: dataset_dir,
            });
        }

        let log = FailureLog::new(
            options
                .failure_log
                .clone()
                .unwrap_or_else(|| layout.upload_failure_log(name)),
        );
        let counters = BatchCounters::new();
        let total = manifest.entries.len();
        let mut backfilled = 0usize;

        info!(dataset = %name, entries = total, "Starting upload");

        for entry in manifest.entries.iter_mut() {
            let local = destination_path(&dataset_dir, &entry.local_path)?;
            if options.update_manifest && entry.sha256.is_pending() && local.is_file() {
                backfill(entry, &local)?;
                backfilled += 1;
            }

            let outcome = self.upload_entry(entry, &local, &log)?;
            counters.record(&outcome);
            self.observer.on_file_complete(&entry.local_path, &outcome);
        }

        if options.update_manifest && backfilled > 0 {
            manifest.refresh();
            write_manifest(&manifest_path, &manifest)?;
            info!(
                dataset = %name,
                backfilled,
                hashed = manifest.hashed,
                "Updated manifest hashes"
            );
        }

        let result = counters.finish(0, total, Some(log.path().to_path_buf()));
        info!(
            dataset = %name,
            uploaded = result.uploaded,
            skipped = result.skipped,
            failed = result.failed,
            bytes = result.bytes_transferred,
            "Upload finished"
        );
        Ok(result)
    }

    fn upload_entry(
        &self,
        entry: &FileEntry,
        local: &Path,
        log: &FailureLog,
    ) -> ShelfResult<EntryOutcome> {
        if !local.is_file() {
            warn!(path = %local.display(), "Local file missing, skipping");
            return Ok(EntryOutcome::Skipped);
        }

        let remote_size = match self.store.head(&entry.remote_key) {
            Ok(size) => size,
            Err(e) => return record_failure(log, &entry.local_path, e),
        };

        if decide_upload(entry.size_bytes, remote_size) == Decision::Skip {
            debug!(key = %entry.remote_key, "Object already present, skipping");
            return Ok(EntryOutcome::Skipped);
        }

        match self.store.put(&entry.remote_key, local) {
            Ok(bytes) => {
                self.observer.on_bytes_transferred(bytes);
                debug!(key = %entry.remote_key, bytes, "Uploaded");
                Ok(EntryOutcome::Uploaded { bytes })
            }
            Err(e) => record_failure(log, &entry.local_path, e),
        }
    }
}

/// Compute the hashes of a pending entry and refresh its size.
fn backfill(entry: &mut FileEntry, local: &Path) -> ShelfResult<()> {
    let digests = calculate_file_digests(local)?;
    entry.sha256 = ContentHash::known(digests.sha256);
    entry.md5 = Some(digests.md5);
    entry.size_bytes = local
        .metadata()
        .map_err(|e| ShelfError::io(local, e))?
        .len();
    Ok(())
}

/// Log a transport failure and count it; pass anything else through.
fn record_failure(log: &FailureLog, path: &str, error: ShelfError) -> ShelfResult<EntryOutcome> {
    match error {
        ShelfError::Transport { reason, .. } => {
            warn!(path = %path, error = %reason, "Upload failed");
            log.append(path, &reason)?;
            Ok(EntryOutcome::Failed { reason })
        }
        other => Err(other),
    }
}
