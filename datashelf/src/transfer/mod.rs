//! Manifest-driven transfer engine.
//!
//! # Architecture
//!
//! ```text
//! BatchOrchestrator (downloads)        Uploader (uploads)
//!         │                                   │
//!         ├── BatchStrategy (trait)           ├── decide_upload
//!         │       ├── SequentialStrategy      └── ObjectStore (head / put)
//!         │       └── ParallelStrategy
//!         │
//!         ├── decide (skip policy)
//!         ├── TransferExecutor (one streamed fetch, .part + rename)
//!         ├── FailureLog (FAILED: <path> - <cause>)
//!         └── BatchCounters -> BatchResult
//! ```
//!
//! Transport failures are per-entry and recoverable. Integrity and local
//! I/O failures abort the batch.

mod destination;
mod executor;
mod failure_log;
mod observer;
mod orchestrator;
mod policy;
mod result;
mod strategy;
mod upload;

pub use destination::{destination_path, relative_destination};
pub use executor::{
    partial_path, TransferError, TransferExecutor, TransferOutcome, TransferRequest,
};
pub use failure_log::{FailureLog, DOWNLOAD_FAILURE_LOG};
pub use observer::{NoopObserver, TransferObserver};
pub use orchestrator::{find_resume_point, BatchOptions, BatchOrchestrator};
pub use policy::{decide, decide_upload, Decision, DiskFile, Expected, LocalFile, VerifyMode};
pub use result::{BatchCounters, BatchResult, EntryOutcome};
pub use strategy::{
    strategy_for, BatchStrategy, ParallelStrategy, SequentialStrategy, DEFAULT_CONCURRENCY,
};
pub use upload::{UploadOptions, Uploader};
