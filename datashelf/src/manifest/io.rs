//! Reading and writing manifest, inventory and index files.
//!
//! JSON documents are written pretty-printed with two-space indentation;
//! inventories are JSON Lines, one object per line.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::media::MediaSummary;
use super::presigned::PresignedManifest;
use super::types::Manifest;
use crate::error::{ShelfError, ShelfResult};

/// One dataset in `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub dataset: String,
    pub root: String,
    /// Manifest path relative to the repository root.
    pub manifest: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub hashed: bool,
}

/// Contents of `index.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub datasets: Vec<IndexEntry>,
}

/// Contents of `media-index.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaIndex {
    pub datasets: Vec<MediaSummary>,
}

/// Read a dataset manifest.
///
/// # Errors
///
/// `NotFound` if the file does not exist, `Parse` if it is not a valid
/// manifest.
pub fn read_manifest(path: &Path) -> ShelfResult<Manifest> {
    read_json(path, "manifest")
}

/// Read a presigned (or public) manifest.
pub fn read_presigned(path: &Path) -> ShelfResult<PresignedManifest> {
    read_json(path, "presigned manifest")
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> ShelfResult<()> {
    write_json(path, manifest)
}

/// Read any JSON document, mapping a missing file to `NotFound`.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> ShelfResult<T> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ShelfError::NotFound {
                what,
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(ShelfError::io(path, e)),
    };

    serde_json::from_slice(&data).map_err(|e| ShelfError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ShelfResult<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| json_write_error(path, e))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| ShelfError::io(path, e))
}

/// Write one JSON object per line.
pub fn write_jsonl<'a, T, I>(path: &Path, records: I) -> ShelfResult<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = create(path)?;
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|e| json_write_error(path, e))?;
        writer
            .write_all(b"\n")
            .map_err(|e| ShelfError::io(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| ShelfError::io(path, e))?;
    Ok(count)
}

fn create(path: &Path) -> ShelfResult<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ShelfError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ShelfError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn json_write_error(path: &Path, e: serde_json::Error) -> ShelfError {
    match e.io_error_kind() {
        Some(kind) => ShelfError::io(path, std::io::Error::new(kind, e)),
        None => ShelfError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    }
}
