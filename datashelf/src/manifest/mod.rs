//! Dataset manifests.
//!
//! A manifest is the canonical inventory of one dataset directory: every
//! regular file with its relative path, object-store key, size, extension,
//! mtime and (optionally) SHA-256. From it the crate derives:
//!
//! - a JSONL inventory (one [`FileRecord`] per line)
//! - a curated media view pairing images with label files ([`media`])
//! - presigned manifests carrying time-limited fetch addresses ([`presigned`])

pub mod builder;
pub mod io;
pub mod media;
pub mod presigned;
mod types;

pub use builder::{BuildOptions, ManifestBuilder, EXCLUDED_DIR_NAMES};
pub use io::{read_manifest, read_presigned, write_manifest, DatasetIndex, IndexEntry, MediaIndex};
pub use media::{curate, MediaKind, MediaRecord, MediaSummary, Split};
pub use presigned::{build_bundle, presign_manifest, PresignedEntry, PresignedManifest};
pub use types::{
    remote_key, ContentHash, FileEntry, FileRecord, Manifest, ManifestSummary, PENDING_HASH,
};
