//! Progress hooks for transfers.

use super::result::EntryOutcome;

/// Receives progress events from the executor and orchestrator.
///
/// Called from worker threads; implementations must be cheap and must not
/// block. Both hooks default to doing nothing.
pub trait TransferObserver: Send + Sync {
    /// A chunk of `bytes` was written (or sent).
    fn on_bytes_transferred(&self, _bytes: u64) {}

    /// An entry finished, identified by its relative path.
    fn on_file_complete(&self, _path: &str, _outcome: &EntryOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}
