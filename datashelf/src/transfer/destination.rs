//! Mapping manifest entries to local paths.

use std::path::{Path, PathBuf};

use crate::error::{ShelfError, ShelfResult};
use crate::manifest::{PresignedEntry, PresignedManifest};

/// Relative destination of `entry`, POSIX-style.
///
/// The path is `local_path` (falling back to the remote key), prefixed with
/// the dataset name unless it already starts with it. The dataset name is
/// the entry's own, then the manifest's dataset, then the bundle name.
pub fn relative_destination(manifest: &PresignedManifest, entry: &PresignedEntry) -> String {
    let rel = entry
        .local_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(&entry.remote_key)
        .trim_start_matches('/');

    let name = entry
        .dataset
        .as_deref()
        .or(manifest.dataset.as_deref())
        .or(manifest.bundle.as_deref())
        .filter(|n| !n.is_empty());

    match name {
        Some(name) if rel.split('/').next() != Some(name) => format!("{}/{}", name, rel),
        _ => rel.to_string(),
    }
}

/// Join a relative destination onto `root`.
///
/// # Errors
///
/// `Parse` if the path would escape `root`.
pub fn destination_path(root: &Path, relative: &str) -> ShelfResult<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(ShelfError::Parse {
                    path: PathBuf::from(relative),
                    reason: "entry path escapes the destination root".to_string(),
                })
            }
            segment => path.push(segment),
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContentHash;

    fn entry(local_path: Option<&str>, key: &str, dataset: Option<&str>) -> PresignedEntry {
        PresignedEntry {
            local_path: local_path.map(str::to_string),
            remote_key: key.to_string(),
            size_bytes: None,
            sha256: ContentHash::Pending,
            fetch_address: format!("memory://{}", key),
            expires_at: None,
            dataset: dataset.map(str::to_string),
            md5: None,
        }
    }

    fn manifest(dataset: Option<&str>, bundle: Option<&str>) -> PresignedManifest {
        PresignedManifest {
            dataset: dataset.map(str::to_string),
            bundle: bundle.map(str::to_string),
            generated_at: None,
            expires_in: None,
            expires_at: None,
            summary: None,
            entries: Vec::new(),
        }
    }

    #[test]
    fn test_local_path_gets_dataset_prefix() {
        let m = manifest(Some("toyset"), None);
        let e = entry(Some("images/a.jpg"), "toyset/images/a.jpg", None);
        assert_eq!(relative_destination(&m, &e), "toyset/images/a.jpg");
    }

    #[test]
    fn test_remote_key_already_prefixed() {
        let m = manifest(Some("toyset"), None);
        let e = entry(None, "toyset/images/a.jpg", None);
        assert_eq!(relative_destination(&m, &e), "toyset/images/a.jpg");
    }

    #[test]
    fn test_entry_dataset_wins_over_bundle() {
        let m = manifest(None, Some("all"));
        let e = entry(Some("x.txt"), "alpha/x.txt", Some("alpha"));
        assert_eq!(relative_destination(&m, &e), "alpha/x.txt");
    }

    #[test]
    fn test_bundle_name_as_last_resort() {
        let m = manifest(None, Some("all"));
        let e = entry(Some("x.txt"), "alpha/x.txt", None);
        assert_eq!(relative_destination(&m, &e), "all/x.txt");
    }

    #[test]
    fn test_no_name_keeps_path() {
        let m = manifest(None, None);
        let e = entry(None, "/loose/file.bin", None);
        assert_eq!(relative_destination(&m, &e), "loose/file.bin");
    }

    #[test]
    fn test_destination_path_joins_segments() {
        let path = destination_path(Path::new("/data"), "toyset/./images//a.jpg").unwrap();
        assert_eq!(path, PathBuf::from("/data/toyset/images/a.jpg"));
    }

    #[test]
    fn test_destination_path_rejects_parent() {
        let result = destination_path(Path::new("/data"), "toyset/../../etc/passwd");
        assert!(matches!(result, Err(ShelfError::Parse { .. })));
    }
}
