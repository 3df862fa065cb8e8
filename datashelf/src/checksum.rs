//! Checksum calculation for manifest entries and local verification.
//!
//! SHA-256 is the integrity hash; MD5 is recorded alongside it on upload.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::{ShelfError, ShelfResult};

/// Buffer size for streamed hashing and transfers (1 MiB).
///
/// Memory use stays bounded regardless of file size.
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Calculate the SHA-256 checksum of a file.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
///
/// # Errors
///
/// Returns `ShelfError::Io` if the file cannot be opened or read.
pub fn calculate_file_checksum(path: &Path) -> ShelfResult<String> {
    let mut file = File::open(path).map_err(|e| ShelfError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ShelfError::io(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 and MD5 of one file, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub sha256: String,
    pub md5: String,
}

/// Calculate SHA-256 and MD5 of a file in a single read.
///
/// # Errors
///
/// Returns `ShelfError::Io` if the file cannot be opened or read.
pub fn calculate_file_digests(path: &Path) -> ShelfResult<FileDigests> {
    let mut file = File::open(path).map_err(|e| ShelfError::io(path, e))?;

    let mut sha256 = Sha256::new();
    let mut md5 = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ShelfError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        sha256.update(&buffer[..bytes_read]);
        md5.update(&buffer[..bytes_read]);
    }

    Ok(FileDigests {
        sha256: format!("{:x}", sha256.finalize()),
        md5: format!("{:x}", md5.finalize()),
    })
}

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
