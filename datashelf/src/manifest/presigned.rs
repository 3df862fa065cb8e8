//! Presigned manifests: the public, time-limited form of a dataset manifest.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ContentHash, Manifest, ManifestSummary};
use crate::error::ShelfResult;
use crate::store::{expiry_after, AddressResolver};

/// Default lifetime of presigned addresses (7 days).
pub const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// One downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedEntry {
    /// Path relative to the dataset directory, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    #[serde(rename = "r2_key")]
    pub remote_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(default)]
    pub sha256: ContentHash,

    #[serde(rename = "presigned_url")]
    pub fetch_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Owning dataset; decides the destination prefix in bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// A manifest whose entries carry fetch addresses.
///
/// Single-dataset payloads set `dataset`; bundles set `bundle` and tag each
/// entry with its dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    /// Lifetime of the addresses in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ManifestSummary>,

    #[serde(rename = "files", default)]
    pub entries: Vec<PresignedEntry>,
}

impl PresignedManifest {
    /// Dataset name, falling back to the bundle name.
    pub fn name(&self) -> Option<&str> {
        self.dataset.as_deref().or(self.bundle.as_deref())
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size_bytes).sum()
    }
}

/// Attach a fetch address to every entry of `manifest`.
///
/// Entry order, sizes and hashes are preserved and every entry is tagged
/// with the dataset. The payload expiry is the earliest address expiry, or
/// `generated_at + ttl` for an empty manifest.
pub fn presign_manifest(
    manifest: &Manifest,
    resolver: &dyn AddressResolver,
    ttl: Duration,
    generated_at: DateTime<Utc>,
) -> ShelfResult<PresignedManifest> {
    let entries = manifest
        .entries
        .iter()
        .map(|entry| {
            let address = resolver.generate_fetch_address(&entry.remote_key, ttl)?;
            Ok(PresignedEntry {
                local_path: Some(entry.local_path.clone()),
                remote_key: entry.remote_key.clone(),
                size_bytes: Some(entry.size_bytes),
                sha256: entry.sha256.clone(),
                fetch_address: address.url,
                expires_at: Some(address.expires_at),
                dataset: Some(manifest.dataset.clone()),
                md5: entry.md5.clone(),
            })
        })
        .collect::<ShelfResult<Vec<_>>>()?;

    debug!(dataset = %manifest.dataset, files = entries.len(), "Presigned manifest");

    Ok(PresignedManifest {
        dataset: Some(manifest.dataset.clone()),
        bundle: None,
        generated_at: Some(generated_at),
        expires_in: Some(ttl.as_secs()),
        expires_at: Some(earliest_expiry(&entries, generated_at, ttl)?),
        summary: Some(manifest.summary),
        entries,
    })
}

/// Merge presigned dataset payloads into one bundle.
///
/// Untagged entries inherit their payload's name. The bundle expires when its
/// earliest entry does.
pub fn build_bundle(
    name: &str,
    payloads: &[PresignedManifest],
    generated_at: DateTime<Utc>,
    ttl: Duration,
) -> ShelfResult<PresignedManifest> {
    let mut entries = Vec::new();
    for payload in payloads {
        let dataset = payload.name().map(str::to_string);
        entries.extend(payload.entries.iter().cloned().map(|mut entry| {
            if entry.dataset.is_none() {
                entry.dataset = dataset.clone();
            }
            entry
        }));
    }

    let expires_at = match payloads.iter().filter_map(|p| p.expires_at).min() {
        Some(earliest) => earliest,
        None => earliest_expiry(&entries, generated_at, ttl)?,
    };

    Ok(PresignedManifest {
        dataset: None,
        bundle: Some(name.to_string()),
        generated_at: Some(generated_at),
        expires_in: Some(ttl.as_secs()),
        expires_at: Some(expires_at),
        summary: None,
        entries,
    })
}

fn earliest_expiry(
    entries: &[PresignedEntry],
    generated_at: DateTime<Utc>,
    ttl: Duration,
) -> ShelfResult<DateTime<Utc>> {
    match entries.iter().filter_map(|e| e.expires_at).min() {
        Some(earliest) => Ok(earliest),
        None => expiry_after(generated_at, ttl),
    }
}
