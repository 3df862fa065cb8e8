//! Skip/fetch decisions for existing local files.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::checksum::calculate_file_checksum;
use crate::error::ShelfResult;
use crate::manifest::ContentHash;

/// How thoroughly existing files are checked before being skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VerifyMode {
    /// Skip any file that exists. Nothing is verified after transfer.
    NoVerify,
    /// Skip files whose size matches without reading their contents.
    FastResume,
    /// Skip only files whose size and hash match.
    #[default]
    Full,
}

impl VerifyMode {
    /// Whether fetched bytes are checked against the manifest.
    pub fn verifies_transfers(self) -> bool {
        !matches!(self, Self::NoVerify)
    }

    /// Pick a mode from the CLI flags.
    ///
    /// `--no-verify` wins over `--fast-resume`.
    pub fn from_flags(no_verify: bool, fast_resume: bool) -> Self {
        if no_verify {
            Self::NoVerify
        } else if fast_resume {
            Self::FastResume
        } else {
            Self::Full
        }
    }
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoVerify => "no-verify",
            Self::FastResume => "fast-resume",
            Self::Full => "full",
        })
    }
}

impl FromStr for VerifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no-verify" | "none" => Ok(Self::NoVerify),
            "fast-resume" | "fast" => Ok(Self::FastResume),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown verify mode '{}'", other)),
        }
    }
}

/// What to do with one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Fetch,
    Reupload,
}

/// What the manifest says the file should be.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    pub size: Option<u64>,
    pub hash: &'a ContentHash,
}

/// A local file whose size is cheap and whose hash is not.
pub trait LocalFile {
    /// Size in bytes, or `None` if there is no regular file.
    fn size(&self) -> Option<u64>;

    fn sha256(&self) -> ShelfResult<String>;
}

/// A [`LocalFile`] on disk.
#[derive(Debug, Clone, Copy)]
pub struct DiskFile<'a> {
    path: &'a Path,
}

impl<'a> DiskFile<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }
}

impl LocalFile for DiskFile<'_> {
    fn size(&self) -> Option<u64> {
        self.path
            .metadata()
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    fn sha256(&self) -> ShelfResult<String> {
        calculate_file_checksum(self.path)
    }
}

/// Decide whether a download can skip an existing local file.
///
/// A missing file is always fetched. Otherwise:
///
/// | mode        | skip when                                  |
/// |-------------|--------------------------------------------|
/// | NoVerify    | always                                     |
/// | FastResume  | size matches, or no size is known          |
/// | Full        | size matches and hash matches (if known)   |
///
/// A pending hash counts as "nothing to compare", so `Full` degrades to a
/// size check. The file is read only in `Full` mode with a known hash.
pub fn decide(
    expected: &Expected<'_>,
    local: &dyn LocalFile,
    mode: VerifyMode,
) -> ShelfResult<Decision> {
    let Some(actual_size) = local.size() else {
        return Ok(Decision::Fetch);
    };

    let size_ok = expected.size.map_or(true, |size| size == actual_size);

    let decision = match mode {
        VerifyMode::NoVerify => Decision::Skip,
        VerifyMode::FastResume if size_ok => Decision::Skip,
        VerifyMode::FastResume => Decision::Fetch,
        VerifyMode::Full if !size_ok => Decision::Fetch,
        VerifyMode::Full => match expected.hash.as_known() {
            None => Decision::Skip,
            Some(hash) if local.sha256()? == hash => Decision::Skip,
            Some(_) => Decision::Fetch,
        },
    };

    Ok(decision)
}

/// Decide whether an upload can skip an object already in the store.
pub fn decide_upload(expected_size: u64, remote_size: Option<u64>) -> Decision {
    match remote_size {
        Some(size) if size == expected_size => Decision::Skip,
        _ => Decision::Reupload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum_bytes;
    use proptest::prelude::*;
    use std::cell::Cell;

    /// In-memory file that counts hash reads.
    struct FakeFile {
        data: Option<Vec<u8>>,
        hash_reads: Cell<usize>,
    }

    impl FakeFile {
        fn new(data: Option<&[u8]>) -> Self {
            Self {
                data: data.map(<[u8]>::to_vec),
                hash_reads: Cell::new(0),
            }
        }
    }

    impl LocalFile for FakeFile {
        fn size(&self) -> Option<u64> {
            self.data.as_ref().map(|d| d.len() as u64)
        }

        fn sha256(&self) -> ShelfResult<String> {
            self.hash_reads.set(self.hash_reads.get() + 1);
            Ok(checksum_bytes(self.data.as_deref().unwrap_or_default()))
        }
    }

    #[test]
    fn test_missing_file_is_fetched_in_every_mode() {
        let hash = ContentHash::Pending;
        let expected = Expected {
            size: Some(3),
            hash: &hash,
        };
        for mode in [VerifyMode::NoVerify, VerifyMode::FastResume, VerifyMode::Full] {
            let decision = decide(&expected, &FakeFile::new(None), mode).unwrap();
            assert_eq!(decision, Decision::Fetch, "{}", mode);
        }
    }

    #[test]
    fn test_full_mode_matching_hash_skips() {
        let hash = ContentHash::known(checksum_bytes(b"abc"));
        let expected = Expected {
            size: Some(3),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"abc"));

        assert_eq!(decide(&expected, &file, VerifyMode::Full).unwrap(), Decision::Skip);
        assert_eq!(file.hash_reads.get(), 1);
    }

    #[test]
    fn test_full_mode_same_size_wrong_hash_fetches() {
        let hash = ContentHash::known(checksum_bytes(b"abc"));
        let expected = Expected {
            size: Some(3),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"xyz"));

        assert_eq!(decide(&expected, &file, VerifyMode::Full).unwrap(), Decision::Fetch);
    }

    #[test]
    fn test_full_mode_pending_hash_is_size_check() {
        let hash = ContentHash::Pending;
        let expected = Expected {
            size: Some(3),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"xyz"));

        assert_eq!(decide(&expected, &file, VerifyMode::Full).unwrap(), Decision::Skip);
        assert_eq!(file.hash_reads.get(), 0);
    }

    #[test]
    fn test_fast_resume_never_reads_contents() {
        let hash = ContentHash::known(checksum_bytes(b"abc"));
        let expected = Expected {
            size: Some(3),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"xyz"));

        assert_eq!(
            decide(&expected, &file, VerifyMode::FastResume).unwrap(),
            Decision::Skip
        );
        assert_eq!(file.hash_reads.get(), 0);
    }

    #[test]
    fn test_fast_resume_size_mismatch_fetches() {
        let hash = ContentHash::Pending;
        let expected = Expected {
            size: Some(10),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"abc"));

        assert_eq!(
            decide(&expected, &file, VerifyMode::FastResume).unwrap(),
            Decision::Fetch
        );
    }

    #[test]
    fn test_no_verify_skips_any_existing_file() {
        let hash = ContentHash::known("00");
        let expected = Expected {
            size: Some(999),
            hash: &hash,
        };
        let file = FakeFile::new(Some(b"a"));

        assert_eq!(decide(&expected, &file, VerifyMode::NoVerify).unwrap(), Decision::Skip);
        assert_eq!(file.hash_reads.get(), 0);
    }

    #[test]
    fn test_decide_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        let hash = ContentHash::known(checksum_bytes(b"hello"));
        let expected = Expected {
            size: Some(5),
            hash: &hash,
        };

        assert_eq!(
            decide(&expected, &DiskFile::new(&path), VerifyMode::Full).unwrap(),
            Decision::Fetch
        );

        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(
            decide(&expected, &DiskFile::new(&path), VerifyMode::Full).unwrap(),
            Decision::Skip
        );
    }

    #[test]
    fn test_directory_is_not_a_local_file() {
        let temp = tempfile::TempDir::new().unwrap();
        assert_eq!(DiskFile::new(temp.path()).size(), None);
    }

    #[test]
    fn test_decide_upload() {
        assert_eq!(decide_upload(5, Some(5)), Decision::Skip);
        assert_eq!(decide_upload(5, Some(4)), Decision::Reupload);
        assert_eq!(decide_upload(5, None), Decision::Reupload);
    }

    #[test]
    fn test_verify_mode_from_flags() {
        assert_eq!(VerifyMode::from_flags(false, false), VerifyMode::Full);
        assert_eq!(VerifyMode::from_flags(false, true), VerifyMode::FastResume);
        assert_eq!(VerifyMode::from_flags(true, true), VerifyMode::NoVerify);
        assert_eq!("fast-resume".parse::<VerifyMode>().unwrap(), VerifyMode::FastResume);
        assert!("bogus".parse::<VerifyMode>().is_err());
    }

    proptest! {
        #[test]
        fn prop_full_skip_implies_size_match(
            data in proptest::collection::vec(any::<u8>(), 0..64),
            expected_size in 0u64..80,
            hashed in any::<bool>(),
        ) {
            let hash = if hashed {
                ContentHash::known(checksum_bytes(&data))
            } else {
                ContentHash::Pending
            };
            let expected = Expected {
                size: Some(expected_size),
                hash: &hash,
            };
            let file = FakeFile::new(Some(&data));

            let decision = decide(&expected, &file, VerifyMode::Full).unwrap();
            prop_assert_eq!(decision == Decision::Skip, expected_size == data.len() as u64);
        }

        #[test]
        fn prop_fast_resume_is_at_least_as_lenient_as_full(
            data in proptest::collection::vec(any::<u8>(), 0..64),
            other in proptest::collection::vec(any::<u8>(), 0..64),
            expected_size in proptest::option::of(0u64..80),
        ) {
            let hash = ContentHash::known(checksum_bytes(&other));
            let expected = Expected {
                size: expected_size,
                hash: &hash,
            };
            let file = FakeFile::new(Some(&data));

            let full = decide(&expected, &file, VerifyMode::Full).unwrap();
            let fast = decide(&expected, &file, VerifyMode::FastResume).unwrap();
            if full == Decision::Skip {
                prop_assert_eq!(fast, Decision::Skip);
            }
        }
    }
}
