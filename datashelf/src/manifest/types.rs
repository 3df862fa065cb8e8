//! Manifest data model shared by the builder, presigner and transfer engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel written in place of a hash that has not been computed yet.
pub const PENDING_HASH: &str = "pending";

/// Expected content hash of a manifest entry.
///
/// `Pending` means "not yet computed", which is not the same as "known to
/// match". On the wire it is the string `"pending"`; `null`, an empty string or
/// a missing field are read as `Pending` too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum ContentHash {
    #[default]
    Pending,
    Known(String),
}

impl ContentHash {
    /// Wrap a computed hex digest.
    pub fn known(hex: impl Into<String>) -> Self {
        Self::Known(hex.into().to_ascii_lowercase())
    }

    /// The digest, if computed.
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(hex) => Some(hex),
            Self::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<Option<String>> for ContentHash {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Self::Pending,
            Some(s) if s.is_empty() || s == PENDING_HASH => Self::Pending,
            Some(s) => Self::known(s),
        }
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        match value {
            ContentHash::Pending => PENDING_HASH.to_string(),
            ContentHash::Known(hex) => hex,
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str(PENDING_HASH),
            Self::Known(hex) => f.write_str(hex),
        }
    }
}

/// Derive the object-store key for a file of a dataset.
pub fn remote_key(dataset: &str, local_path: &str) -> String {
    format!("{}/{}", dataset, local_path)
}

/// One file of a dataset manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// POSIX-style path relative to the dataset directory.
    pub local_path: String,

    /// Object-store key, `{dataset}/{local_path}`.
    #[serde(rename = "r2_key")]
    pub remote_key: String,

    /// Authoritative expected size.
    pub size_bytes: u64,

    #[serde(default)]
    pub sha256: ContentHash,

    /// Lowercase extension without the dot, or empty.
    #[serde(default)]
    pub ext: String,

    /// Modification time, unix seconds.
    #[serde(default)]
    pub mtime: f64,

    /// MD5 filled in with the SHA-256 when an upload backfills hashes;
    /// carried through to presigned manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// File count and byte total of a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub file_count: usize,
    pub total_bytes: u64,
}

impl ManifestSummary {
    pub fn of(entries: &[FileEntry]) -> Self {
        Self {
            file_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        }
    }
}

/// Canonical inventory of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub dataset: String,

    /// Dataset directory relative to the repository root.
    #[serde(default)]
    pub root: String,

    pub generated_at: DateTime<Utc>,

    /// Whether `sha256` fields are authoritative.
    #[serde(default)]
    pub hashed: bool,

    #[serde(default)]
    pub summary: ManifestSummary,

    #[serde(rename = "files")]
    pub entries: Vec<FileEntry>,
}

impl Manifest {
    /// Assemble a manifest, sorting entries by `local_path`.
    pub fn new(
        dataset: impl Into<String>,
        mut entries: Vec<FileEntry>,
        hashed: bool,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let dataset = dataset.into();
        entries.sort_by(|a, b| a.local_path.cmp(&b.local_path));
        Self {
            root: format!("datasets/{}", dataset),
            summary: ManifestSummary::of(&entries),
            dataset,
            generated_at,
            hashed,
            entries,
        }
    }

    /// Recompute the summary and `hashed` flag after entries changed.
    pub fn refresh(&mut self) {
        self.summary = ManifestSummary::of(&self.entries);
        self.hashed =
            !self.entries.is_empty() && self.entries.iter().all(|e| !e.sha256.is_pending());
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.sha256.is_pending()).count()
    }
}

/// One line of the `<dataset>.jsonl` inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the repository root.
    pub path: String,
    pub dataset: String,
    pub rel_path: String,
    pub size_bytes: u64,
    pub mtime: f64,
    pub ext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileRecord {
    /// Build the inventory line for a manifest entry.
    pub fn from_entry(dataset: &str, root: &str, entry: &FileEntry) -> Self {
        Self {
            path: format!("{}/{}", root, entry.local_path),
            dataset: dataset.to_string(),
            rel_path: entry.local_path.clone(),
            size_bytes: entry.size_bytes,
            mtime: entry.mtime,
            ext: entry.ext.clone(),
            sha256: entry.sha256.as_known().map(str::to_string),
        }
    }
}
