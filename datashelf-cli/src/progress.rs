//! Terminal progress for batch transfers.

use std::sync::atomic::{AtomicU64, Ordering};

use datashelf::transfer::{EntryOutcome, TransferObserver};
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {pos} files {msg}";

/// Progress bar counting finished files and transferred bytes.
///
/// Draws to stderr and hides itself when stderr is not a terminal.
pub struct ProgressObserver {
    bar: ProgressBar,
    bytes: AtomicU64,
}

impl ProgressObserver {
    /// Bar for a known number of files.
    pub fn new(files: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(files as u64), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self::with_bar(bar)
    }

    /// Spinner when the file count is not known up front.
    pub fn unbounded() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            bytes: AtomicU64::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferObserver for ProgressObserver {
    fn on_bytes_transferred(&self, bytes: u64) {
        let total = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bar.set_message(HumanBytes(total).to_string());
    }

    fn on_file_complete(&self, path: &str, outcome: &EntryOutcome) {
        if let EntryOutcome::Failed { reason } = outcome {
            self.bar.println(format!("FAILED: {} - {}", path, reason));
        }
        self.bar.inc(1);
    }
}
