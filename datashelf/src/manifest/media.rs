//! Curated media view of a dataset manifest.
//!
//! Restricts the inventory to images, videos and annotations, infers the
//! train/val/test split from path segments, and pairs YOLO-style images
//! with their label files through a shared group key.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{FileEntry, Manifest};

/// Image extensions recognised by the curated view.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Video extensions recognised by the curated view.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "m4v"];

/// Extension of YOLO label files.
pub const LABEL_EXTENSION: &str = "txt";

/// Media classification of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Annotation,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Annotation => "annotation",
            MediaKind::Other => "other",
        }
    }
}

/// Dataset split inferred from the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

/// One line of `<dataset>.media.jsonl`.
///
/// Optional fields are omitted when absent, never written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub path: String,
    pub dataset: String,
    pub rel_path: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_with: Option<String>,
}

/// Infer the split from path segments; first match wins.
pub fn infer_split(rel_path: &str) -> Option<Split> {
    rel_path
        .split('/')
        .find_map(|segment| match segment.to_lowercase().as_str() {
            "train" => Some(Split::Train),
            "val" | "valid" | "validation" => Some(Split::Val),
            "test" => Some(Split::Test),
            _ => None,
        })
}

/// Group key shared by an image and its label.
///
/// Everything after the first `images` segment (or, failing that, the first
/// `labels` segment), with the final extension stripped.
pub fn group_key(rel_path: &str) -> Option<String> {
    let parts: Vec<&str> = rel_path.split('/').collect();
    let idx = parts
        .iter()
        .position(|p| *p == "images")
        .or_else(|| parts.iter().position(|p| *p == "labels"))?;

    let tail = &parts[idx + 1..];
    let (last, dirs) = tail.split_last()?;
    let stem = Path::new(last)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut key: Vec<&str> = dirs.to_vec();
    key.push(&stem);
    Some(key.join("/"))
}

/// Classify a file by extension and path conventions.
pub fn classify(rel_path: &str, ext: &str) -> MediaKind {
    let lower = rel_path.to_lowercase();
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);

    if IMAGE_EXTENSIONS.contains(&ext) {
        return MediaKind::Image;
    }
    if VIDEO_EXTENSIONS.contains(&ext) {
        return MediaKind::Video;
    }

    let is_annotation = match ext {
        LABEL_EXTENSION => lower.contains("/labels/") || lower.starts_with("labels/"),
        "json" => {
            lower.contains("/annotations/")
                || lower.starts_with("annotations/")
                || file_name.starts_with("instances_")
        }
        "xml" => {
            lower.contains("/annotations") || lower.contains("pascal") || lower.contains("voc")
        }
        _ => false,
    };

    if is_annotation {
        MediaKind::Annotation
    } else {
        MediaKind::Other
    }
}

/// Build the curated media view for a manifest.
///
/// `path` values are `{manifest.root}/{local_path}`; `paired_with` refers to
/// the counterpart's `path`.
pub fn curate(manifest: &Manifest) -> Vec<MediaRecord> {
    let full_path = |entry: &FileEntry| format!("{}/{}", manifest.root, entry.local_path);

    let mut images: HashMap<String, &FileEntry> = HashMap::new();
    let mut labels: HashMap<String, &FileEntry> = HashMap::new();
    for entry in &manifest.entries {
        let Some(key) = group_key(&entry.local_path) else {
            continue;
        };
        // Only entries that appear in the view may be counterparts.
        match classify(&entry.local_path, &entry.ext) {
            MediaKind::Image => {
                images.entry(key).or_insert(entry);
            }
            MediaKind::Annotation if entry.ext == LABEL_EXTENSION => {
                labels.entry(key).or_insert(entry);
            }
            _ => {}
        }
    }

    manifest
        .entries
        .iter()
        .filter_map(|entry| {
            let kind = classify(&entry.local_path, &entry.ext);
            if kind == MediaKind::Other {
                return None;
            }

            let mut group_id = None;
            let mut paired_with = None;
            if matches!(kind, MediaKind::Image | MediaKind::Annotation) {
                if let Some(key) = group_key(&entry.local_path) {
                    let (own, other) = match kind {
                        MediaKind::Image => (&images, &labels),
                        _ => (&labels, &images),
                    };
                    // First file per key claims the pair, keeping it one-to-one.
                    if own.get(&key).is_some_and(|e| std::ptr::eq(*e, entry)) {
                        paired_with = other.get(&key).map(|c| full_path(*c));
                    }
                    group_id = Some(key);
                }
            }

            Some(MediaRecord {
                path: full_path(entry),
                dataset: manifest.dataset.clone(),
                rel_path: entry.local_path.clone(),
                kind,
                group_id,
                split: infer_split(&entry.local_path),
                paired_with,
            })
        })
        .collect()
}

/// Per-dataset counts for `media-index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub dataset: String,
    pub manifest: String,
    pub counts: BTreeMap<String, usize>,
    pub splits: BTreeMap<String, usize>,
    pub paired_records: usize,
}

impl MediaSummary {
    pub fn of(dataset: &str, manifest_path: &str, records: &[MediaRecord]) -> Self {
        let mut counts = BTreeMap::new();
        let mut splits = BTreeMap::new();
        counts.insert("total".to_string(), records.len());

        for record in records {
            *counts.entry(record.kind.as_str().to_string()).or_insert(0) += 1;
            if let Some(split) = record.split {
                *splits.entry(split.as_str().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            dataset: dataset.to_string(),
            manifest: manifest_path.to_string(),
            counts,
            splits,
            paired_records: records.iter().filter(|r| r.paired_with.is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::{remote_key, ContentHash};
    use chrono::Utc;
    use proptest::prelude::*;

    fn manifest_of(paths: &[&str]) -> Manifest {
        let entries = paths
            .iter()
            .map(|p| FileEntry {
                local_path: p.to_string(),
                remote_key: remote_key("toyset", p),
                size_bytes: 1,
                sha256: ContentHash::Pending,
                ext: Path::new(p)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default(),
                mtime: 0.0,
                md5: None,
            })
            .collect();
        Manifest::new("toyset", entries, false, Utc::now())
    }

    #[test]
    fn test_pairing_is_symmetric() {
        let manifest = manifest_of(&["images/x.jpg", "labels/x.txt"]);

        let records = curate(&manifest);

        assert_eq!(records.len(), 2);
        let image = records.iter().find(|r| r.kind == MediaKind::Image).unwrap();
        let label = records.iter().find(|r| r.kind == MediaKind::Annotation).unwrap();
        assert_eq!(image.paired_with.as_deref(), Some(label.path.as_str()));
        assert_eq!(label.paired_with.as_deref(), Some(image.path.as_str()));
        assert_eq!(image.group_id.as_deref(), Some("x"));
        assert_eq!(label.group_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_unmatched_image_has_no_pair() {
        let manifest = manifest_of(&["images/train/a.png", "labels/train/b.txt"]);

        let records = curate(&manifest);

        assert!(records.iter().all(|r| r.paired_with.is_none()));
        assert_eq!(records[0].group_id.as_deref(), Some("train/a"));
        assert_eq!(records[0].split, Some(Split::Train));
    }

    #[test]
    fn test_other_files_excluded() {
        let manifest = manifest_of(&["README.md", "notes.txt", "clips/run.mp4"]);

        let records = curate(&manifest);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MediaKind::Video);
        assert_eq!(records[0].group_id, None);
    }

    #[test]
    fn test_classify_annotations() {
        assert_eq!(classify("annotations/instances_val.json", "json"), MediaKind::Annotation);
        assert_eq!(classify("coco/instances_train.json", "json"), MediaKind::Annotation);
        assert_eq!(classify("meta/config.json", "json"), MediaKind::Other);
        assert_eq!(classify("VOC2012/Annotations/1.xml", "xml"), MediaKind::Annotation);
        assert_eq!(classify("data/Labels/a.txt", "txt"), MediaKind::Annotation);
        assert_eq!(classify("data/a.txt", "txt"), MediaKind::Other);
    }

    #[test]
    fn test_infer_split() {
        assert_eq!(infer_split("images/Validation/a.jpg"), Some(Split::Val));
        assert_eq!(infer_split("train/test/a.jpg"), Some(Split::Train));
        assert_eq!(infer_split("valid/a.jpg"), Some(Split::Val));
        assert_eq!(infer_split("images/a.jpg"), None);
    }

    #[test]
    fn test_group_key() {
        assert_eq!(group_key("x/images/train/a.b.jpg").as_deref(), Some("train/a.b"));
        assert_eq!(group_key("labels/a.txt").as_deref(), Some("a"));
        assert_eq!(group_key("other/a.txt"), None);
        assert_eq!(group_key("images"), None);
    }

    #[test]
    fn test_media_record_omits_absent_fields() {
        let record = MediaRecord {
            path: "datasets/toyset/clip.mp4".to_string(),
            dataset: "toyset".to_string(),
            rel_path: "clip.mp4".to_string(),
            kind: MediaKind::Video,
            group_id: None,
            split: None,
            paired_with: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("null"));
        assert!(!json.contains("group_id"));
        assert!(json.contains(r#""kind":"video""#));
    }

    #[test]
    fn test_media_summary_counts() {
        let manifest = manifest_of(&["images/val/x.jpg", "labels/val/x.txt", "clip.mp4"]);
        let records = curate(&manifest);

        let summary = MediaSummary::of("toyset", "datasets/manifests/toyset.media.jsonl", &records);

        assert_eq!(summary.counts["total"], 3);
        assert_eq!(summary.counts["image"], 1);
        assert_eq!(summary.counts["annotation"], 1);
        assert_eq!(summary.counts["video"], 1);
        assert_eq!(summary.splits["val"], 2);
        assert_eq!(summary.paired_records, 2);
    }

    proptest! {
        #[test]
        fn prop_pairing_symmetric(
            stems in proptest::collection::btree_set("[a-z]{1,6}", 1..8),
            with_label in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let mut paths = Vec::new();
            for (i, stem) in stems.iter().enumerate() {
                paths.push(format!("images/{}.jpg", stem));
                if with_label[i] {
                    paths.push(format!("labels/{}.txt", stem));
                }
            }
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let records = curate(&manifest_of(&refs));

            let by_path: HashMap<&str, &MediaRecord> =
                records.iter().map(|r| (r.path.as_str(), r)).collect();
            for record in &records {
                if let Some(other) = &record.paired_with {
                    let counterpart = by_path[other.as_str()];
                    prop_assert_eq!(counterpart.paired_with.as_deref(), Some(record.path.as_str()));
                    prop_assert_ne!(counterpart.kind, record.kind);
                }
            }
        }
    }
}
