//! Manifest-driven batch downloads.
//!
//! The orchestrator walks a presigned manifest from a start offset, asks
//! the skip policy about each entry, runs the executor for entries that need
//! fetching and folds the outcomes into a [`BatchResult`]. Transport
//! failures are logged and counted; integrity and local I/O failures abort
//! the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::destination::{destination_path, relative_destination};
use super::executor::{TransferError, TransferExecutor, TransferRequest};
use super::failure_log::{FailureLog, DOWNLOAD_FAILURE_LOG};
use super::observer::{NoopObserver, TransferObserver};
use super::policy::{decide, Decision, DiskFile, Expected, VerifyMode};
use super::result::{BatchCounters, BatchResult, EntryOutcome};
use super::strategy::{strategy_for, DEFAULT_CONCURRENCY};
use crate::error::ShelfResult;
use crate::manifest::{presign_manifest, Manifest, PresignedEntry, PresignedManifest};
use crate::store::{AddressResolver, Fetcher};

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub destination_root: PathBuf,
    pub verify_mode: VerifyMode,
    /// Worker count; 1 runs sequentially in manifest order.
    pub concurrency: usize,
    /// Entries before this index are not looked at.
    pub start_index: usize,
    /// Defaults to `<destination_root>/failed_downloads.log`.
    pub failure_log: Option<PathBuf>,
}

impl BatchOptions {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            verify_mode: VerifyMode::default(),
            concurrency: DEFAULT_CONCURRENCY,
            start_index: 0,
            failure_log: None,
        }
    }

    pub fn with_verify_mode(mut self, verify_mode: VerifyMode) -> Self {
        self.verify_mode = verify_mode;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = Some(path.into());
        self
    }

    /// Where transport failures are appended.
    pub fn failure_log_path(&self) -> PathBuf {
        self.failure_log
            .clone()
            .unwrap_or_else(|| self.destination_root.join(DOWNLOAD_FAILURE_LOG))
    }
}

/// Runs batches of downloads.
#[derive(Clone)]
pub struct BatchOrchestrator {
    executor: TransferExecutor,
    observer: Arc<dyn TransferObserver>,
}

impl BatchOrchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_executor(TransferExecutor::new(fetcher))
    }

    pub fn with_executor(executor: TransferExecutor) -> Self {
        Self {
            executor,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Download every entry of `manifest` from `options.start_index` on.
    ///
    /// # Errors
    ///
    /// The first integrity or local I/O error. Transport failures never
    /// fail the batch; they are counted in the result.
    pub fn run(
        &self,
        manifest: &PresignedManifest,
        options: &BatchOptions,
    ) -> ShelfResult<BatchResult> {
        let total = manifest.entries.len();
        let start = options.start_index.min(total);
        let pending = &manifest.entries[start..];
        let log = FailureLog::new(options.failure_log_path());
        let counters = BatchCounters::new();

        info!(
            manifest = manifest.name().unwrap_or("<unnamed>"),
            entries = pending.len(),
            start_index = start,
            verify = %options.verify_mode,
            concurrency = options.concurrency,
            "Starting download batch"
        );

        let strategy = strategy_for(options.concurrency);
        let outcome = strategy.execute(pending.len(), &|index| {
            self.process_entry(manifest, &pending[index], options, &counters, &log)
        });

        let result = counters.finish(start, total, Some(log.path().to_path_buf()));
        if let Err(e) = outcome {
            warn!(
                downloaded = result.downloaded,
                skipped = result.skipped,
                failed = result.failed,
                error = %e,
                "Download batch aborted"
            );
            return Err(e);
        }

        info!(
            downloaded = result.downloaded,
            skipped = result.skipped,
            failed = result.failed,
            bytes = result.bytes_transferred,
            "Download batch finished"
        );
        Ok(result)
    }

    /// Presign `manifest` in memory, then download it.
    pub fn run_manifest(
        &self,
        manifest: &Manifest,
        resolver: &dyn AddressResolver,
        ttl: Duration,
        options: &BatchOptions,
    ) -> ShelfResult<BatchResult> {
        let presigned = presign_manifest(manifest, resolver, ttl, Utc::now())?;
        self.run(&presigned, options)
    }

    fn process_entry(
        &self,
        manifest: &PresignedManifest,
        entry: &PresignedEntry,
        options: &BatchOptions,
        counters: &BatchCounters,
        log: &FailureLog,
    ) -> ShelfResult<()> {
        let relative = relative_destination(manifest, entry);
        let destination = destination_path(&options.destination_root, &relative)?;
        let expected = Expected {
            size: entry.size_bytes,
            hash: &entry.sha256,
        };

        let local = DiskFile::new(&destination);
        let outcome = match decide(&expected, &local, options.verify_mode)? {
            Decision::Skip => {
                debug!(path = %relative, "Local file satisfies manifest, skipping");
                EntryOutcome::Skipped
            }
            Decision::Fetch | Decision::Reupload => {
                let request = TransferRequest {
                    address: &entry.fetch_address,
                    destination: &destination,
                    expected_hash: entry.sha256.as_known(),
                    expected_size: entry.size_bytes,
                    verify: options.verify_mode.verifies_transfers(),
                };
                match self.executor.transfer(&request, self.observer.as_ref()) {
                    Ok(done) => EntryOutcome::Downloaded {
                        bytes: done.bytes_transferred,
                    },
                    Err(TransferError::Transport(e)) => {
                        warn!(path = %relative, error = %e.reason, "Download failed");
                        log.append(&relative, &e.reason)?;
                        EntryOutcome::Failed { reason: e.reason }
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        counters.record(&outcome);
        self.observer.on_file_complete(&relative, &outcome);
        Ok(())
    }
}

/// Index of the first entry whose destination does not exist.
///
/// Returns the entry count when every destination exists. Only existence is
/// checked; sizes and hashes are left to the skip policy.
pub fn find_resume_point(
    manifest: &PresignedManifest,
    destination_root: &Path,
) -> ShelfResult<usize> {
    for (index, entry) in manifest.entries.iter().enumerate() {
        let relative = relative_destination(manifest, entry);
        if !destination_path(destination_root, &relative)?.exists() {
            return Ok(index);
        }
    }
    Ok(manifest.entries.len())
}
