//! Object store connection settings.

use std::fmt;

use crate::error::{ShelfError, ShelfResult};

/// Default bucket holding published datasets.
pub const DEFAULT_BUCKET: &str = "drone-datasets";

/// Region used for S3-compatible endpoints that ignore regions.
pub const DEFAULT_REGION: &str = "auto";

/// Connection settings for an S3-compatible object store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    /// Unauthenticated base URL of the bucket, if published.
    pub public_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: DEFAULT_BUCKET.to_string(),
            access_key_id: None,
            secret_access_key: None,
            region: DEFAULT_REGION.to_string(),
            public_url: None,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<set>"),
            )
            .field("region", &self.region)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl StoreConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into());
        self
    }

    /// True when endpoint and both credential halves are present.
    pub fn has_credentials(&self) -> bool {
        self.endpoint.is_some() && self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Names of required settings that are missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push("endpoint");
        }
        if self.access_key_id.is_none() {
            missing.push("access_key_id");
        }
        if self.secret_access_key.is_none() {
            missing.push("secret_access_key");
        }
        if self.bucket.is_empty() {
            missing.push("bucket");
        }
        missing
    }

    /// Fail with a `Configuration` error naming every missing setting.
    pub fn require_credentials(&self) -> ShelfResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShelfError::Configuration(format!(
                "missing object store settings: {}",
                missing.join(", ")
            )))
        }
    }
}
