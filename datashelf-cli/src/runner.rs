//! Shared setup for every command: config, environment, logging, layout.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use datashelf::config::{ConfigFile, DEFAULT_LOG_LEVEL};
use datashelf::layout::DatasetLayout;
use datashelf::logging::{init_logging, WorkerGuard};
use datashelf::store::{AddressResolver, HttpFetcher, PublicBaseUrl, S3ObjectStore, StoreConfig};
use tracing::{info, warn};

use crate::error::CliError;

/// Environment variables that override `[storage]`.
pub const ENV_ENDPOINT: &str = "CLOUDFLARE_R2_ENDPOINT_URL";
pub const ENV_ENDPOINT_ALT: &str = "CLOUDFLARE_R2_ENDPOINT";
pub const ENV_ACCESS_KEY_ID: &str = "CLOUDFLARE_R2_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "CLOUDFLARE_R2_SECRET_ACCESS_KEY";
pub const ENV_BUCKET: &str = "CLOUDFLARE_R2_BUCKET_NAME";
pub const ENV_PUBLIC_URL: &str = "CLOUDFLARE_R2_PUBLIC_URL";

/// Default datasets directory, relative to the working directory.
const DEFAULT_DATASETS_DIR: &str = "datasets";

/// Options shared by all subcommands.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub datasets_dir: Option<PathBuf>,
    pub verbose: u8,
}

/// Loaded configuration plus the logging guard.
pub struct CliRunner {
    config: ConfigFile,
    layout: DatasetLayout,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load config, apply environment overrides and install logging.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let mut config = match &options.config {
            Some(path) if !path.exists() => {
                return Err(CliError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        config.storage = apply_env(config.storage, |key| env::var(key).ok());

        let level = match options.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        let level = if level.is_empty() {
            DEFAULT_LOG_LEVEL.to_string()
        } else {
            level
        };
        let log_guard = init_logging(&level, config.logging.file.as_deref())?;

        let datasets_dir = options
            .datasets_dir
            .clone()
            .or_else(|| config.paths.datasets_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASETS_DIR));

        Ok(Self {
            config,
            layout: DatasetLayout::new(datasets_dir),
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command,
            datasets_dir = %self.layout.datasets_dir.display(),
            "datashelf starting"
        );
    }

    /// Authenticated object store; fails before any transfer when
    /// credentials are missing.
    pub fn object_store(&self) -> Result<Arc<S3ObjectStore>, CliError> {
        Ok(Arc::new(S3ObjectStore::new(&self.config.storage)?))
    }

    /// Signing resolver when credentials are set, else the public base URL.
    ///
    /// Fails with a configuration error when neither is configured.
    pub fn address_resolver(&self) -> Result<Arc<dyn AddressResolver>, CliError> {
        let storage = &self.config.storage;
        if storage.has_credentials() {
            return Ok(self.object_store()?);
        }
        match &storage.public_url {
            Some(base) => {
                warn!(base = %base, "No object store credentials, using public URLs");
                Ok(Arc::new(PublicBaseUrl::new(base.clone())))
            }
            None => {
                storage.require_credentials()?;
                Err(CliError::Config("object store is not configured".to_string()))
            }
        }
    }

    pub fn fetcher(&self) -> Result<Arc<HttpFetcher>, CliError> {
        Ok(Arc::new(HttpFetcher::with_timeout(
            self.config.transfer.timeout(),
        )?))
    }
}

/// Overlay `CLOUDFLARE_R2_*` variables on `storage`.
///
/// Empty variables are ignored. `CLOUDFLARE_R2_ENDPOINT_URL` wins over
/// `CLOUDFLARE_R2_ENDPOINT`.
pub fn apply_env(mut storage: StoreConfig, lookup: impl Fn(&str) -> Option<String>) -> StoreConfig {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = get(ENV_ENDPOINT).or_else(|| get(ENV_ENDPOINT_ALT)) {
        storage.endpoint = Some(endpoint);
    }
    if let Some(key_id) = get(ENV_ACCESS_KEY_ID) {
        storage.access_key_id = Some(key_id);
    }
    if let Some(secret) = get(ENV_SECRET_ACCESS_KEY) {
        storage.secret_access_key = Some(secret);
    }
    if let Some(bucket) = get(ENV_BUCKET) {
        storage.bucket = bucket;
    }
    if let Some(public_url) = get(ENV_PUBLIC_URL) {
        storage.public_url = Some(public_url);
    }
    storage
}
