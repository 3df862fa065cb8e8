//! Datashelf - dataset manifests and verified transfers for object storage
//!
//! This library builds content manifests for on-disk datasets, publishes them
//! as presigned manifests, and moves files between local disk and an
//! S3-compatible object store (Cloudflare R2) with checksum verification,
//! resume support and per-file failure accounting.
//!
//! # Modules
//!
//! - [`manifest`]: build, curate, presign and persist manifests
//! - [`store`]: fetch / presign / upload collaborators
//! - [`transfer`]: skip policy, executor, batch orchestration, uploads
//! - [`layout`]: on-disk dataset tree and batch builds
//! - [`config`], [`logging`]: ambient configuration and tracing setup

pub mod checksum;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod manifest;
pub mod store;
pub mod transfer;

pub use error::{IntegrityError, ShelfError, ShelfResult};
pub use layout::{build_all, BuildReport, DatasetLayout};
