//! Object-store collaborators.
//!
//! The transfer engine only needs three capabilities, each behind a trait:
//!
//! ```text
//! Fetcher          address -> byte stream           (downloads)
//! AddressResolver  key + ttl -> signed fetch address (presigning)
//! ObjectStore      head / put by key                 (uploads)
//! ```
//!
//! Production implementations are [`HttpFetcher`] (blocking reqwest) and
//! [`S3ObjectStore`] (aws-sdk-s3 against an S3-compatible endpoint such as
//! Cloudflare R2). [`MemoryStore`] implements all three in memory for tests.

mod config;
mod http;
mod memory;
mod s3;

pub use config::{StoreConfig, DEFAULT_BUCKET, DEFAULT_REGION};
pub use http::{HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use memory::MemoryStore;
pub use s3::S3ObjectStore;

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{ShelfError, ShelfResult};

/// Streamed body of a fetched object.
pub type ByteStream = Box<dyn Read + Send>;

/// Network-layer failure for a single address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransportError {
    pub address: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for ShelfError {
    fn from(e: TransportError) -> Self {
        ShelfError::Transport {
            address: e.address,
            reason: e.reason,
        }
    }
}

/// Opens a byte stream for a fetch address.
pub trait Fetcher: Send + Sync {
    /// Start fetching `address`.
    ///
    /// Errors while opening are transport errors; errors while reading the
    /// returned stream are reported by the stream itself.
    fn fetch(&self, address: &str) -> Result<ByteStream, TransportError>;
}

/// A time-limited fetch address for an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAddress {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Turns object keys into fetch addresses.
pub trait AddressResolver: Send + Sync {
    /// Generate an address for `key` valid for `ttl`.
    fn generate_fetch_address(&self, key: &str, ttl: Duration) -> ShelfResult<FetchAddress>;
}

/// Key-value object store used by uploads.
pub trait ObjectStore: AddressResolver {
    /// Size of the object at `key`, or `None` if it does not exist.
    fn head(&self, key: &str) -> ShelfResult<Option<u64>>;

    /// Upload the file at `source` to `key`, returning bytes sent.
    ///
    /// Network failures must be reported as `ShelfError::Transport`.
    fn put(&self, key: &str, source: &Path) -> ShelfResult<u64>;
}

/// Resolves keys against an unauthenticated public base URL.
///
/// Used when the bucket is published and no credentials are configured.
#[derive(Debug, Clone)]
pub struct PublicBaseUrl {
    base: String,
}

impl PublicBaseUrl {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl AddressResolver for PublicBaseUrl {
    fn generate_fetch_address(&self, key: &str, ttl: Duration) -> ShelfResult<FetchAddress> {
        Ok(FetchAddress {
            url: format!("{}/{}", self.base, key),
            expires_at: expiry_from_now(ttl)?,
        })
    }
}

/// `now + ttl`, rejecting durations chrono cannot represent.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> ShelfResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| ShelfError::Configuration(format!("expiry of {:?} is out of range", ttl)))
}

fn expiry_from_now(ttl: Duration) -> ShelfResult<DateTime<Utc>> {
    expiry_after(Utc::now(), ttl)
}
