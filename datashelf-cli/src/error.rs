//! CLI error type and exit codes.

use std::path::PathBuf;

use datashelf::config::ConfigError;
use datashelf::ShelfError;
use thiserror::Error;

/// Process exit codes.
pub mod exit {
    pub const NOT_FOUND: u8 = 1;
    pub const INTEGRITY: u8 = 2;
    pub const TRANSFER_FAILURES: u8 = 3;
    pub const CONFIG: u8 = 4;
    pub const OTHER: u8 = 5;
}

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Shelf(#[from] ShelfError),

    #[error("{0}")]
    Config(String),

    /// The batch ran to completion but some files failed.
    #[error("{failed} file(s) failed, see {}", log.display())]
    TransferFailures { failed: usize, log: PathBuf },
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Shelf(e) => match e {
                ShelfError::NotFound { .. } => exit::NOT_FOUND,
                ShelfError::Integrity(_) => exit::INTEGRITY,
                ShelfError::Transport { .. } => exit::TRANSFER_FAILURES,
                ShelfError::Configuration(_) => exit::CONFIG,
                ShelfError::Io { .. } | ShelfError::Parse { .. } | ShelfError::Store(_) => {
                    exit::OTHER
                }
            },
            CliError::Config(_) => exit::CONFIG,
            CliError::TransferFailures { .. } => exit::TRANSFER_FAILURES,
        }
    }
}
