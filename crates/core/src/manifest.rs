//! Build manifest entries and file lists.

use crate::hash::{ContentHash, HashType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file a client wants a manifest hash for.
///
/// `build_manifest_hash` is `Unknown` on input. Resolution produces a new
/// entry with the hash filled in (or still `Unknown` when it failed); entries
/// are never updated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifestEntry {
    pub drop_name: String,
    pub relative_path: String,
    pub source_hash: ContentHash,
    pub full_file_path: PathBuf,
    #[serde(default = "unknown_hash")]
    pub build_manifest_hash: ContentHash,
}

fn unknown_hash() -> ContentHash {
    ContentHash::Unknown
}

impl BuildManifestEntry {
    /// Create an unresolved entry.
    pub fn new(
        drop_name: impl Into<String>,
        relative_path: impl Into<String>,
        source_hash: ContentHash,
        full_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            drop_name: drop_name.into(),
            relative_path: relative_path.into(),
            source_hash,
            full_file_path: full_file_path.into(),
            build_manifest_hash: ContentHash::Unknown,
        }
    }

    /// Copy of this entry carrying the given manifest hash.
    pub fn with_build_manifest_hash(&self, hash: ContentHash) -> Self {
        Self {
            build_manifest_hash: hash,
            ..self.clone()
        }
    }

    /// Whether the entry carries a usable manifest hash.
    pub fn is_valid(&self) -> bool {
        self.build_manifest_hash.is_digest()
    }

    /// Whether the manifest hash was produced by the expected algorithm.
    pub fn is_valid_for(&self, manifest_hash_type: HashType) -> bool {
        self.build_manifest_hash.hash_type() == Some(manifest_hash_type)
    }
}

/// One line of a generated build manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifestFile {
    pub relative_path: String,
    pub hash: ContentHash,
}

/// The generated file list of one drop, sorted by relative path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifestFileList {
    pub drop_name: String,
    pub files: Vec<BuildManifestFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_unresolved() {
        let entry = BuildManifestEntry::new(
            "drop",
            "bin/tool.exe",
            ContentHash::compute(HashType::Blake3, b"tool"),
            "/out/bin/tool.exe",
        );
        assert!(!entry.is_valid());
        assert!(entry.build_manifest_hash.is_unknown());
    }

    #[test]
    fn test_with_hash_leaves_original_untouched() {
        let entry = BuildManifestEntry::new(
            "drop",
            "a.txt",
            ContentHash::compute(HashType::Blake3, b"a"),
            "/out/a.txt",
        );
        let manifest = ContentHash::compute(HashType::Sha256, b"a");
        let resolved = entry.with_build_manifest_hash(manifest);

        assert!(resolved.is_valid());
        assert!(resolved.is_valid_for(HashType::Sha256));
        assert!(!resolved.is_valid_for(HashType::Blake3));
        assert!(!entry.is_valid());
    }

    #[test]
    fn test_absent_manifest_hash_is_not_valid() {
        let entry = BuildManifestEntry::new("d", "x", ContentHash::AbsentFile, "/x")
            .with_build_manifest_hash(ContentHash::AbsentFile);
        assert!(!entry.is_valid());
    }
}
