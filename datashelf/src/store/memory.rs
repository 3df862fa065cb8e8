//! In-memory object store for tests and dry runs.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::{
    expiry_after, AddressResolver, ByteStream, FetchAddress, Fetcher, ObjectStore, TransportError,
};
use crate::error::{ShelfError, ShelfResult};

/// Scheme used for addresses issued by [`MemoryStore`].
pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
enum Fault {
    /// Refuse the request outright.
    Refuse(String),
    /// Deliver this many bytes, then fail the stream.
    Truncate(usize),
}

/// Object store holding objects in a map.
///
/// Implements [`Fetcher`], [`AddressResolver`] and [`ObjectStore`]. Issued
/// addresses look like `memory://<key>?ttl=<secs>`; `fetch` also accepts a
/// bare key. Faults can be injected per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    faults: RwLock<HashMap<String, Fault>>,
    fetched: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<String>>,
    issued_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the clock used for address expiry.
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.write().insert(key.into(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Make every request for `key` fail with `reason`.
    pub fn fail(&self, key: impl Into<String>, reason: impl Into<String>) {
        self.faults
            .write()
            .insert(key.into(), Fault::Refuse(reason.into()));
    }

    /// Make fetches of `key` break after `bytes` bytes.
    pub fn truncate_after(&self, key: impl Into<String>, bytes: usize) {
        self.faults.write().insert(key.into(), Fault::Truncate(bytes));
    }

    /// Keys fetched so far, in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    /// Keys uploaded so far, in request order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().clone()
    }

    fn key_of(address: &str) -> &str {
        let key = address.strip_prefix(MEMORY_SCHEME).unwrap_or(address);
        key.split_once('?').map(|(k, _)| k).unwrap_or(key)
    }
}

impl Fetcher for MemoryStore {
    fn fetch(&self, address: &str) -> Result<ByteStream, TransportError> {
        let key = Self::key_of(address);
        self.fetched.lock().push(key.to_string());

        let fault = self.faults.read().get(key).cloned();
        if let Some(Fault::Refuse(reason)) = &fault {
            return Err(TransportError::new(address, reason.clone()));
        }

        let Some(data) = self.get(key) else {
            return Err(TransportError::new(address, "HTTP 404 Not Found"));
        };

        match fault {
            Some(Fault::Truncate(bytes)) => Ok(Box::new(BrokenStream {
                inner: Cursor::new(data),
                remaining: bytes,
            })),
            _ => Ok(Box::new(Cursor::new(data))),
        }
    }
}

impl AddressResolver for MemoryStore {
    fn generate_fetch_address(&self, key: &str, ttl: Duration) -> ShelfResult<FetchAddress> {
        let issued_at = self.issued_at.unwrap_or_else(Utc::now);
        Ok(FetchAddress {
            url: format!("{}{}?ttl={}", MEMORY_SCHEME, key, ttl.as_secs()),
            expires_at: expiry_after(issued_at, ttl)?,
        })
    }
}

impl ObjectStore for MemoryStore {
    fn head(&self, key: &str) -> ShelfResult<Option<u64>> {
        if let Some(Fault::Refuse(reason)) = self.faults.read().get(key) {
            return Err(ShelfError::Transport {
                address: key.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.objects.read().get(key).map(|d| d.len() as u64))
    }

    fn put(&self, key: &str, source: &Path) -> ShelfResult<u64> {
        if let Some(Fault::Refuse(reason)) = self.faults.read().get(key) {
            return Err(ShelfError::Transport {
                address: key.to_string(),
                reason: reason.clone(),
            });
        }

        let data = fs::read(source).map_err(|e| ShelfError::io(source, e))?;
        let size = data.len() as u64;
        self.insert(key, data);
        self.uploaded.lock().push(key.to_string());
        Ok(size)
    }
}

/// Stream that fails once its byte allowance is used up.
struct BrokenStream {
    inner: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let limit = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..limit])?;
        self.remaining -= n;
        Ok(n)
    }
}
