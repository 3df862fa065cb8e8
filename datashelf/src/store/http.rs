//! Blocking HTTP fetcher for presigned and public URLs.

use std::time::Duration;

use reqwest::blocking::Client;

use super::{ByteStream, Fetcher, TransportError};
use crate::error::{ShelfError, ShelfResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Fetcher backed by a blocking reqwest client.
///
/// The response body is handed to the caller unbuffered; the executor
/// streams it to disk in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> ShelfResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> ShelfResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ShelfError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, timeout })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, address: &str) -> Result<ByteStream, TransportError> {
        let response = self.client.get(address).send().map_err(|e| {
            if e.is_timeout() {
                TransportError::new(
                    address,
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            } else {
                TransportError::new(address, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                address,
                format!("GET request failed with status {}", status),
            ));
        }

        Ok(Box::new(response))
    }
}
