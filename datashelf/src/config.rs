//! INI configuration file.
//!
//! ```ini
//! [storage]
//! endpoint = https://<account>.r2.cloudflarestorage.com
//! bucket = drone-datasets
//! access_key_id =
//! secret_access_key =
//! region = auto
//! public_url =
//!
//! [paths]
//! datasets_dir =
//!
//! [transfer]
//! concurrency = 4
//! verify = full
//! expires_in = 604800
//! timeout_secs = 300
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Empty values mean "unset". A missing file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::error::ShelfError;
use crate::manifest::presigned::DEFAULT_EXPIRY_SECS;
use crate::store::{StoreConfig, DEFAULT_TIMEOUT_SECS};
use crate::transfer::{VerifyMode, DEFAULT_CONCURRENCY};

/// Default log level when neither the file nor `RUST_LOG` set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl From<ConfigError> for ShelfError {
    fn from(err: ConfigError) -> Self {
        ShelfError::Configuration(err.to_string())
    }
}

/// Location of the user configuration file.
///
/// `<config_dir>/datashelf/config.ini`, falling back to the working
/// directory when the platform has no config dir.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datashelf")
        .join("config.ini")
}

/// `[paths]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSettings {
    /// Root of the dataset tree; the CLI falls back to `./datasets`.
    pub datasets_dir: Option<PathBuf>,
}

/// `[transfer]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub concurrency: usize,
    pub verify: VerifyMode,
    /// Lifetime of presigned addresses, in seconds.
    pub expires_in: u64,
    /// HTTP request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            verify: VerifyMode::default(),
            expires_in: DEFAULT_EXPIRY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl TransferSettings {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_verify(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `datashelf=debug`.
    pub level: String,
    /// Optional log file in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LoggingSettings {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StoreConfig,
    pub paths: PathSettings,
    pub transfer: TransferSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse already-loaded INI text.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("storage")) {
            let storage = &mut config.storage;
            storage.endpoint = value(section, "endpoint");
            storage.access_key_id = value(section, "access_key_id");
            storage.secret_access_key = value(section, "secret_access_key");
            storage.public_url = value(section, "public_url");
            if let Some(bucket) = value(section, "bucket") {
                storage.bucket = bucket;
            }
            if let Some(region) = value(section, "region") {
                storage.region = region;
            }
        }

        if let Some(section) = ini.section(Some("paths")) {
            config.paths.datasets_dir = value(section, "datasets_dir").map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("transfer")) {
            let transfer = &mut config.transfer;
            if let Some(n) = parsed::<usize>(section, "transfer", "concurrency")? {
                if n == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "transfer",
                        key: "concurrency",
                        value: n.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                transfer.concurrency = n;
            }
            if let Some(mode) = parsed::<VerifyMode>(section, "transfer", "verify")? {
                transfer.verify = mode;
            }
            if let Some(secs) = parsed::<u64>(section, "transfer", "expires_in")? {
                transfer.expires_in = secs;
            }
            if let Some(secs) = parsed::<u64>(section, "transfer", "timeout_secs")? {
                transfer.timeout_secs = secs;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = value(section, "level") {
                config.logging.level = level;
            }
            config.logging.file = value(section, "file").map(PathBuf::from);
        }

        Ok(config)
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Write every key, unset values as empty strings.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)
    }

    fn to_ini(&self) -> Ini {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let opt_path = |v: &Option<PathBuf>| {
            v.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };

        let mut ini = Ini::new();
        ini.with_section(Some("storage"))
            .set("endpoint", opt(&self.storage.endpoint))
            .set("bucket", self.storage.bucket.as_str())
            .set("access_key_id", opt(&self.storage.access_key_id))
            .set("secret_access_key", opt(&self.storage.secret_access_key))
            .set("region", self.storage.region.as_str())
            .set("public_url", opt(&self.storage.public_url));
        ini.with_section(Some("paths"))
            .set("datasets_dir", opt_path(&self.paths.datasets_dir));
        ini.with_section(Some("transfer"))
            .set("concurrency", self.transfer.concurrency.to_string())
            .set("verify", self.transfer.verify.to_string())
            .set("expires_in", self.transfer.expires_in.to_string())
            .set("timeout_secs", self.transfer.timeout_secs.to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str())
            .set("file", opt_path(&self.logging.file));
        ini
    }
}

fn value(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parsed<T>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match value(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw,
                reason: e.to_string(),
            }),
    }
}
