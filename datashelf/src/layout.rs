//! On-disk dataset layout and batch manifest builds.
//!
//! ```text
//! <repo>/datasets/<name>/...                     dataset files
//! <repo>/datasets/manifests/<name>.json          manifest
//! <repo>/datasets/manifests/<name>.jsonl         inventory
//! <repo>/datasets/manifests/<name>.media.jsonl   curated media view
//! <repo>/datasets/manifests/index.json
//! <repo>/datasets/manifests/media-index.json
//! <repo>/datasets/manifests/presigned/<name>.public.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ShelfError, ShelfResult};
use crate::manifest::builder::posix_relative;
use crate::manifest::io::{write_json, write_jsonl};
use crate::manifest::{
    curate, write_manifest, BuildOptions, DatasetIndex, FileRecord, IndexEntry, ManifestBuilder,
    MediaIndex, MediaSummary,
};

/// Directory name of the manifests dir inside the datasets dir.
pub const MANIFESTS_DIR_NAME: &str = "manifests";

const INDEX_FILE: &str = "index.json";
const MEDIA_INDEX_FILE: &str = "media-index.json";

/// Paths of the dataset tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub datasets_dir: PathBuf,
    pub manifests_dir: PathBuf,
}

impl DatasetLayout {
    /// Standard layout with manifests under `<datasets_dir>/manifests`.
    pub fn new(datasets_dir: impl Into<PathBuf>) -> Self {
        let datasets_dir = datasets_dir.into();
        Self {
            manifests_dir: datasets_dir.join(MANIFESTS_DIR_NAME),
            datasets_dir,
        }
    }

    pub fn with_manifests_dir(mut self, manifests_dir: impl Into<PathBuf>) -> Self {
        self.manifests_dir = manifests_dir.into();
        self
    }

    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.datasets_dir.join(name)
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.manifests_dir.join(format!("{}.json", name))
    }

    pub fn inventory_path(&self, name: &str) -> PathBuf {
        self.manifests_dir.join(format!("{}.jsonl", name))
    }

    pub fn media_path(&self, name: &str) -> PathBuf {
        self.manifests_dir.join(format!("{}.media.jsonl", name))
    }

    pub fn index_path(&self) -> PathBuf {
        self.manifests_dir.join(INDEX_FILE)
    }

    pub fn media_index_path(&self) -> PathBuf {
        self.manifests_dir.join(MEDIA_INDEX_FILE)
    }

    pub fn presigned_dir(&self) -> PathBuf {
        self.manifests_dir.join("presigned")
    }

    /// `presigned/<name>.public.json`, for datasets and bundles alike.
    pub fn presigned_path(&self, name: &str) -> PathBuf {
        self.presigned_dir().join(format!("{}.public.json", name))
    }

    pub fn upload_failure_log(&self, name: &str) -> PathBuf {
        self.manifests_dir
            .join(format!("{}.upload_failures.log", name))
    }

    /// Parent of the datasets dir; paths in inventories are relative to it.
    pub fn repo_root(&self) -> &Path {
        self.datasets_dir.parent().unwrap_or(&self.datasets_dir)
    }

    /// POSIX path of `path` relative to the repository root.
    pub fn repo_relative(&self, path: &Path) -> String {
        posix_relative(self.repo_root(), path).unwrap_or_else(|| path.display().to_string())
    }

    /// Names with a manifest, sorted.
    pub fn list_datasets(&self) -> ShelfResult<Vec<String>> {
        let entries = match fs::read_dir(&self.manifests_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ShelfError::io(&self.manifests_dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ShelfError::io(&self.manifests_dir, e))?
                .path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let is_index = file_name == INDEX_FILE || file_name == MEDIA_INDEX_FILE;
            if !is_json || is_index || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Dataset directories, sorted case-insensitively.
    pub fn discover_datasets(&self) -> ShelfResult<Vec<String>> {
        let entries =
            fs::read_dir(&self.datasets_dir).map_err(|e| ShelfError::io(&self.datasets_dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ShelfError::io(&self.datasets_dir, e))?;
            let path = entry.path();
            if !path.is_dir() || path == self.manifests_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != MANIFESTS_DIR_NAME {
                names.push(name);
            }
        }
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }
}

/// What a batch build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub built: Vec<IndexEntry>,
    /// Requested names that are not dataset directories.
    pub missing: Vec<String>,
}

/// Build manifests, inventories and media views for `names`.
///
/// An empty `names` builds every dataset directory. The two index files
/// are rewritten to describe the datasets built in this run.
pub fn build_all(
    layout: &DatasetLayout,
    names: &[String],
    options: &BuildOptions,
) -> ShelfResult<BuildReport> {
    let names = if names.is_empty() {
        layout.discover_datasets()?
    } else {
        names.to_vec()
    };

    let builder = ManifestBuilder::new(options.clone());
    let mut report = BuildReport::default();
    let mut media_index = MediaIndex::default();

    for name in names {
        let dataset_dir = layout.dataset_dir(&name);
        if !dataset_dir.is_dir() {
            warn!(dataset = %name, path = %dataset_dir.display(), "Dataset not found, skipping");
            report.missing.push(name);
            continue;
        }

        let mut manifest = builder.build(&dataset_dir)?;
        manifest.root = layout.repo_relative(&dataset_dir);
        let dataset = manifest.dataset.clone();

        let records: Vec<FileRecord> = manifest
            .entries
            .iter()
            .map(|entry| FileRecord::from_entry(&dataset, &manifest.root, entry))
            .collect();
        write_jsonl(&layout.inventory_path(&dataset), &records)?;

        let manifest_path = layout.manifest_path(&dataset);
        write_manifest(&manifest_path, &manifest)?;
        let manifest_label = layout.repo_relative(&manifest_path);

        let media = curate(&manifest);
        write_jsonl(&layout.media_path(&dataset), &media)?;
        media_index
            .datasets
            .push(MediaSummary::of(&dataset, &manifest_label, &media));

        info!(
            dataset = %dataset,
            files = manifest.summary.file_count,
            bytes = manifest.summary.total_bytes,
            media = media.len(),
            hashed = manifest.hashed,
            "Built manifest"
        );

        report.built.push(IndexEntry {
            dataset,
            root: manifest.root.clone(),
            manifest: manifest_label,
            file_count: manifest.summary.file_count,
            total_bytes: manifest.summary.total_bytes,
            hashed: manifest.hashed,
        });
    }

    write_json(
        &layout.index_path(),
        &DatasetIndex {
            datasets: report.built.clone(),
        },
    )?;
    write_json(&layout.media_index_path(), &media_index)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::io::read_json;
    use crate::manifest::read_manifest;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout::new("/repo/datasets");
        assert_eq!(
            layout.manifest_path("toyset"),
            PathBuf::from("/repo/datasets/manifests/toyset.json")
        );
        assert_eq!(
            layout.presigned_path("toyset"),
            PathBuf::from("/repo/datasets/manifests/presigned/toyset.public.json")
        );
        assert_eq!(
            layout.repo_relative(&layout.dataset_dir("toyset")),
            "datasets/toyset"
        );
    }

    #[test]
    fn test_build_all_writes_every_output() {
        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path().join("datasets"));
        write(
            &layout.datasets_dir,
            "toyset/images/train/a.jpg",
            b"\x89jpg",
        );
        write(
            &layout.datasets_dir,
            "toyset/labels/train/a.txt",
            b"0 0.5 0.5 1 1",
        );
        write(&layout.datasets_dir, "Beta/readme.md", b"hi");

        let report = build_all(&layout, &[], &BuildOptions::default()).unwrap();

        let names: Vec<&str> = report.built.iter().map(|e| e.dataset.as_str()).collect();
        assert_eq!(names, vec!["Beta", "toyset"]);
        assert!(report.missing.is_empty());

        let manifest = read_manifest(&layout.manifest_path("toyset")).unwrap();
        assert_eq!(manifest.root, "datasets/toyset");
        assert_eq!(manifest.entries[0].remote_key, "toyset/images/train/a.jpg");

        let inventory = fs::read_to_string(layout.inventory_path("toyset")).unwrap();
        assert_eq!(inventory.lines().count(), 2);
        assert!(inventory.contains(r#""path":"datasets/toyset/images/train/a.jpg""#));

        let media = fs::read_to_string(layout.media_path("toyset")).unwrap();
        assert_eq!(media.matches("paired_with").count(), 2);

        let index: DatasetIndex = read_json(&layout.index_path(), "index").unwrap();
        assert_eq!(index.datasets[1].manifest, "datasets/manifests/toyset.json");
        assert_eq!(index.datasets[1].file_count, 2);

        let media_index: MediaIndex = read_json(&layout.media_index_path(), "index").unwrap();
        assert_eq!(media_index.datasets[1].paired_records, 2);

        assert_eq!(layout.list_datasets().unwrap(), vec!["Beta", "toyset"]);
    }

    #[test]
    fn test_build_all_skips_missing_names() {
        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path().join("datasets"));
        write(&layout.datasets_dir, "toyset/a.txt", b"a");

        let report = build_all(
            &layout,
            &["toyset".to_string(), "ghost".to_string()],
            &BuildOptions::default(),
        )
        .unwrap();

        assert_eq!(report.built.len(), 1);
        assert_eq!(report.missing, vec!["ghost"]);
    }

    #[test]
    fn test_list_datasets_without_manifests_dir() {
        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path().join("datasets"));
        assert!(layout.list_datasets().unwrap().is_empty());
    }
}
