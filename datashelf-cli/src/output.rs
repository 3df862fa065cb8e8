//! Console output helpers shared by command handlers.

use console::style;
use datashelf::transfer::BatchResult;
use indicatif::HumanBytes;

/// Sink for user-facing text.
pub trait Output {
    fn println(&self, line: &str);

    fn header(&self, title: &str);

    fn newline(&self) {
        self.println("");
    }

    fn indented(&self, line: &str) {
        self.println(&format!("  {}", line));
    }
}

/// Writes to stdout with styled headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn println(&self, line: &str) {
        println!("{}", line);
    }

    fn header(&self, title: &str) {
        println!("{}", style(title).bold().cyan());
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

/// Final summary line of a download batch.
pub fn download_summary(result: &BatchResult) -> String {
    let mut line = format!(
        "Download complete: {} files downloaded, {} skipped, {} failed ({})",
        result.downloaded,
        result.skipped,
        result.failed,
        format_size(result.bytes_transferred)
    );
    if let Some(log) = &result.failure_log {
        line.push_str(&format!("; failures logged to {}", log.display()));
    }
    line
}

/// Final summary line of an upload run.
pub fn upload_summary(dataset: &str, result: &BatchResult) -> String {
    let mut line = format!(
        "{}: {} uploaded, {} skipped, {} failed ({})",
        dataset,
        result.uploaded,
        result.skipped,
        result.failed,
        format_size(result.bytes_transferred)
    );
    if let Some(log) = &result.failure_log {
        line.push_str(&format!("; failures logged to {}", log.display()));
    }
    line
}
