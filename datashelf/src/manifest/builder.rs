//! Directory walker producing canonical dataset manifests.
//!
//! The builder is a pure read of the filesystem. Persisting the result is
//! left to [`super::io`] and the dataset layout.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::Utc;
use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use super::types::{remote_key, ContentHash, FileEntry, Manifest};
use crate::checksum::calculate_file_checksum;
use crate::error::{ShelfError, ShelfResult};

/// Directory names never descended into.
pub const EXCLUDED_DIR_NAMES: &[&str] = &[".git", ".idea", "node_modules", "__pycache__"];

/// Options for building a manifest.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Compute SHA-256 for every file (slow on large datasets).
    pub hash: bool,
}

impl BuildOptions {
    pub fn with_hash(mut self, hash: bool) -> Self {
        self.hash = hash;
        self
    }
}

/// A regular file found during the walk, before hashing.
struct Candidate {
    path: PathBuf,
    local_path: String,
    size_bytes: u64,
    mtime: f64,
}

/// Builds a [`Manifest`] from a dataset directory.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    options: BuildOptions,
}

impl ManifestBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Walk `dataset_root` and return its manifest.
    ///
    /// The dataset name is the directory name with surrounding whitespace
    /// trimmed. Files that disappear while the walk is running are skipped.
    ///
    /// # Errors
    ///
    /// `NotFound` if `dataset_root` is not a directory, `Io` for any other
    /// filesystem failure.
    pub fn build(&self, dataset_root: &Path) -> ShelfResult<Manifest> {
        if !dataset_root.is_dir() {
            return Err(ShelfError::NotFound {
                what: "dataset directory",
                path: dataset_root.to_path_buf(),
            });
        }

        let dataset = dataset_name(dataset_root);
        let candidates = collect_candidates(dataset_root)?;
        debug!(
            dataset = %dataset,
            files = candidates.len(),
            hash = self.options.hash,
            "Walked dataset"
        );

        let hash = self.options.hash;
        let entries: Vec<FileEntry> = candidates
            .into_par_iter()
            .map(|candidate| to_entry(&dataset, candidate, hash))
            .collect::<ShelfResult<Vec<Option<FileEntry>>>>()?
            .into_iter()
            .flatten()
            .collect();

        Ok(Manifest::new(dataset, entries, hash, Utc::now()))
    }
}

/// Dataset name derived from its directory.
pub fn dataset_name(dataset_root: &Path) -> String {
    dataset_root
        .file_name()
        .map(|n| n.to_string_lossy().trim().to_string())
        .unwrap_or_default()
}

/// Lowercased extension without the dot, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// POSIX-style path of `path` relative to `root`.
pub fn posix_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn collect_candidates(root: &Path) -> ShelfResult<Vec<Candidate>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !(e.file_type().is_dir() && e.depth() > 0 && EXCLUDED_DIR_NAMES.contains(&name))
        });

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_vanished(e.io_error()) => {
                debug!(path = ?e.path(), "Entry vanished during walk, skipping");
                continue;
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                return Err(ShelfError::io(path, e.into()));
            }
        };

        let Some(metadata) = file_metadata(&entry)? else {
            continue;
        };

        let Some(local_path) = posix_relative(root, entry.path()) else {
            continue;
        };

        candidates.push(Candidate {
            path: entry.path().to_path_buf(),
            local_path,
            size_bytes: metadata.len(),
            mtime: mtime_secs(&metadata),
        });
    }

    Ok(candidates)
}

/// Metadata for regular files and symlinks to regular files.
///
/// Symlinked directories are not descended into. `None` for anything else,
/// including entries that vanished or dangling links.
fn file_metadata(entry: &walkdir::DirEntry) -> ShelfResult<Option<Metadata>> {
    let file_type = entry.file_type();
    let result = if file_type.is_file() {
        entry.metadata().map_err(io::Error::from)
    } else if file_type.is_symlink() {
        fs::metadata(entry.path())
    } else {
        return Ok(None);
    };

    match result {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %entry.path().display(), "File vanished before stat, skipping");
            Ok(None)
        }
        Err(e) => Err(ShelfError::io(entry.path(), e)),
    }
}

fn to_entry(dataset: &str, candidate: Candidate, hash: bool) -> ShelfResult<Option<FileEntry>> {
    let sha256 = if hash {
        match calculate_file_checksum(&candidate.path) {
            Ok(hex) => ContentHash::known(hex),
            Err(ShelfError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %candidate.path.display(), "File vanished before hashing, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    } else {
        ContentHash::Pending
    };

    Ok(Some(FileEntry {
        remote_key: remote_key(dataset, &candidate.local_path),
        ext: extension_of(&candidate.path),
        local_path: candidate.local_path,
        size_bytes: candidate.size_bytes,
        sha256,
        mtime: candidate.mtime,
        md5: None,
    }))
}

fn mtime_secs(metadata: &Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn is_vanished(err: Option<&io::Error>) -> bool {
    err.map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}
