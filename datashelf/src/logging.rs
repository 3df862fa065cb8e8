//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when configured, to a file through a
//! non-blocking writer. `RUST_LOG` overrides the configured level.

use std::fs;
use std::io;
use std::path::Path;

use time::format_description::well_known::Rfc3339;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ShelfError, ShelfResult};

pub use tracing_appender::non_blocking::WorkerGuard;

/// Parse a level directive such as `info` or `datashelf=debug,warn`.
pub fn parse_filter(level: &str) -> ShelfResult<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| ShelfError::Configuration(format!("invalid log level '{}': {}", level, e)))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process. Returns `None` when no file is configured.
///
/// # Errors
///
/// `Configuration` for a bad level directive, `Io` if the log directory
/// cannot be created.
pub fn init_logging(level: &str, file: Option<&Path>) -> ShelfResult<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(level)?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(false);

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir).map_err(|e| ShelfError::io(dir, e))?;
            let file_name = path.file_name().ok_or_else(|| {
                ShelfError::Configuration(format!("log file has no name: {}", path.display()))
            })?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be installed (tests, embedding programs).
    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already set, keeping it");
    }

    Ok(guard)
}
