//! S3-compatible object store client (Cloudflare R2, MinIO, AWS).
//!
//! The AWS SDK is async; this client owns a small tokio runtime and blocks
//! on each request so the transfer engine can stay synchronous.

use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::config::StoreConfig;
use super::{expiry_after, AddressResolver, FetchAddress, ObjectStore};
use crate::error::{ShelfError, ShelfResult};

/// Worker threads for the embedded runtime.
const RUNTIME_THREADS: usize = 2;

/// Object store backed by the AWS SDK.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    runtime: Runtime,
}

impl S3ObjectStore {
    /// Connect using explicit endpoint credentials.
    ///
    /// # Errors
    ///
    /// `Configuration` if endpoint or credentials are missing, or the
    /// runtime cannot be started.
    pub fn new(config: &StoreConfig) -> ShelfResult<Self> {
        config.require_credentials()?;
        let (Some(endpoint), Some(access_key_id), Some(secret_access_key)) = (
            config.endpoint.as_deref(),
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
        ) else {
            return Err(ShelfError::Configuration(
                "object store credentials are incomplete".to_string(),
            ));
        };

        let credentials =
            Credentials::new(access_key_id, secret_access_key, None, None, "datashelf");
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let runtime = Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .enable_all()
            .build()
            .map_err(|e| ShelfError::Configuration(format!("failed to start runtime: {}", e)))?;

        debug!(endpoint = %endpoint, bucket = %config.bucket, "Created S3 client");

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            runtime,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl AddressResolver for S3ObjectStore {
    fn generate_fetch_address(&self, key: &str, ttl: Duration) -> ShelfResult<FetchAddress> {
        let issued_at = Utc::now();
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| ShelfError::Configuration(format!("invalid expiry {:?}: {}", ttl, e)))?;

        let request = self
            .runtime
            .block_on(
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .presigned(presigning),
            )
            .map_err(|e| ShelfError::Store(format!("failed to presign {}: {}", key, e)))?;

        Ok(FetchAddress {
            url: request.uri().to_string(),
            expires_at: expiry_after(issued_at, ttl)?,
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn head(&self, key: &str) -> ShelfResult<Option<u64>> {
        let request = self.client.head_object().bucket(&self.bucket).key(key);

        match self.runtime.block_on(request.send()) {
            Ok(output) => Ok(Some(output.content_length().map(|l| l as u64).unwrap_or(0))),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(ShelfError::Transport {
                        address: key.to_string(),
                        reason: service_err.to_string(),
                    })
                }
            }
        }
    }

    fn put(&self, key: &str, source: &Path) -> ShelfResult<u64> {
        let size = source
            .metadata()
            .map_err(|e| ShelfError::io(source, e))?
            .len();

        let body = self
            .runtime
            .block_on(ByteStream::from_path(source))
            .map_err(|e| ShelfError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        self.runtime
            .block_on(request.send())
            .map_err(|err| ShelfError::Transport {
                address: key.to_string(),
                reason: err.to_string(),
            })?;

        Ok(size)
    }
}
