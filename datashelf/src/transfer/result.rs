//! Batch accounting.
//!
//! Workers update [`BatchCounters`] concurrently; the orchestrator turns a
//! final snapshot into a [`BatchResult`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Result of processing one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Bytes were fetched and (if enabled) verified.
    Downloaded { bytes: u64 },
    /// Bytes were sent to the object store.
    Uploaded { bytes: u64 },
    /// The local copy (or remote object) already satisfied the policy.
    Skipped,
    /// Transport failure, recorded in the failure log.
    Failed { reason: String },
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub downloaded: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
    /// Set when at least one failure was logged.
    pub failure_log: Option<PathBuf>,
    /// First entry considered; earlier entries were never looked at.
    pub start_index: usize,
    /// Entries in the manifest, including those before `start_index`.
    pub total_entries: usize,
}

impl BatchResult {
    /// Entries considered by this run.
    pub fn considered(&self) -> usize {
        self.total_entries.saturating_sub(self.start_index)
    }

    /// True when every considered entry was transferred or skipped.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.downloaded + self.uploaded + self.skipped == self.considered()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Fold another batch into this one, for multi-dataset runs.
    ///
    /// Counts and entry totals add up; the latest failure log wins.
    pub fn absorb(&mut self, other: BatchResult) {
        self.downloaded += other.downloaded;
        self.uploaded += other.uploaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.bytes_transferred += other.bytes_transferred;
        self.start_index += other.start_index;
        self.total_entries += other.total_entries;
        if other.failure_log.is_some() {
            self.failure_log = other.failure_log;
        }
    }
}

/// Lock-free counters shared by batch workers.
#[derive(Debug, Default)]
pub struct BatchCounters {
    downloaded: AtomicUsize,
    uploaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
}

impl BatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished entry.
    pub fn record(&self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Downloaded { bytes } => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
                self.bytes.fetch_add(*bytes, Ordering::SeqCst);
            }
            EntryOutcome::Uploaded { bytes } => {
                self.uploaded.fetch_add(1, Ordering::SeqCst);
                self.bytes.fetch_add(*bytes, Ordering::SeqCst);
            }
            EntryOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            EntryOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Entries finished so far.
    pub fn completed(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
            + self.uploaded.load(Ordering::SeqCst)
            + self.skipped.load(Ordering::SeqCst)
            + self.failed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Build the final result.
    pub fn finish(
        &self,
        start_index: usize,
        total_entries: usize,
        failure_log: Option<PathBuf>,
    ) -> BatchResult {
        let failed = self.failed();
        BatchResult {
            downloaded: self.downloaded.load(Ordering::SeqCst),
            uploaded: self.uploaded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed,
            bytes_transferred: self.bytes.load(Ordering::SeqCst),
            failure_log: failure_log.filter(|_| failed > 0),
            start_index,
            total_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_record() {
        let counters = BatchCounters::new();
        counters.record(&EntryOutcome::Downloaded { bytes: 10 });
        counters.record(&EntryOutcome::Downloaded { bytes: 5 });
        counters.record(&EntryOutcome::Skipped);
        counters.record(&EntryOutcome::Failed {
            reason: "HTTP 500".into(),
        });

        assert_eq!(counters.completed(), 4);

        let result = counters.finish(2, 6, Some(PathBuf::from("/tmp/failed.log")));
        assert_eq!(result.downloaded, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.bytes_transferred, 15);
        assert_eq!(result.considered(), 4);
        assert_eq!(result.failure_log, Some(PathBuf::from("/tmp/failed.log")));
        assert!(!result.is_complete());
        assert!(result.has_failures());
    }

    #[test]
    fn test_failure_log_dropped_without_failures() {
        let counters = BatchCounters::new();
        counters.record(&EntryOutcome::Uploaded { bytes: 3 });

        let result = counters.finish(0, 1, Some(PathBuf::from("/tmp/failed.log")));
        assert_eq!(result.failure_log, None);
        assert_eq!(result.uploaded, 1);
        assert!(result.is_complete());
    }

    #[test]
    fn test_start_beyond_end_considers_nothing() {
        let result = BatchCounters::new().finish(10, 3, None);
        assert_eq!(result.considered(), 0);
        assert!(result.is_complete());
    }

    #[test]
    fn test_absorb_adds_counts_and_keeps_failure_log() {
        let mut total = BatchResult::default();
        let first = BatchCounters::new();
        first.record(&EntryOutcome::Failed {
            reason: "HTTP 503".into(),
        });
        total.absorb(first.finish(0, 1, Some(PathBuf::from("/tmp/failed.log"))));

        let second = BatchCounters::new();
        second.record(&EntryOutcome::Downloaded { bytes: 7 });
        second.record(&EntryOutcome::Skipped);
        total.absorb(second.finish(0, 2, Some(PathBuf::from("/tmp/failed.log"))));

        assert_eq!(total.downloaded, 1);
        assert_eq!(total.skipped, 1);
        assert_eq!(total.failed, 1);
        assert_eq!(total.bytes_transferred, 7);
        assert_eq!(total.total_entries, 3);
        assert_eq!(total.failure_log, Some(PathBuf::from("/tmp/failed.log")));
    }

    #[test]
    fn test_counters_shared_across_threads() {
        let counters = Arc::new(BatchCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..100 {
                        counters.record(&EntryOutcome::Downloaded { bytes: 1 });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let result = counters.finish(0, 800, None);
        assert_eq!(result.downloaded, 800);
        assert_eq!(result.bytes_transferred, 800);
    }
}
