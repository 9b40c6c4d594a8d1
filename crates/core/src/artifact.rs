//! Strongly-typed file and directory handles issued by the orchestrator.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A file known to the orchestrator.
///
/// `rewrite_count` distinguishes successive versions of the same path: zero
/// for source files, one or more for files produced by the build.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    pub path: PathBuf,
    #[serde(default)]
    pub rewrite_count: u32,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>, rewrite_count: u32) -> Self {
        Self {
            path: path.into(),
            rewrite_count,
        }
    }

    /// A handle with an empty path carries no identity.
    pub fn is_valid(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Whether the file is produced by the build rather than a source file.
    pub fn is_output(&self) -> bool {
        self.rewrite_count > 0
    }

    /// Byte-for-byte comparison of the handle's path against a declared path.
    pub fn matches_path(&self, declared: &Path) -> bool {
        self.path.as_os_str() == declared.as_os_str()
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({}@{})", self.path.display(), self.rewrite_count)
    }
}

/// A sealed directory: a closed snapshot of a directory's file membership.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryHandle {
    pub path: PathBuf,
    /// Distinguishes multiple seals of the same directory path.
    #[serde(default)]
    pub seal_id: u32,
}

impl DirectoryHandle {
    pub fn new(path: impl Into<PathBuf>, seal_id: u32) -> Self {
        Self {
            path: path.into(),
            seal_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Byte-for-byte comparison of the handle's path against a declared path.
    pub fn matches_path(&self, declared: &Path) -> bool {
        self.path.as_os_str() == declared.as_os_str()
    }
}

/// Declared content of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentInfo {
    pub hash: ContentHash,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl FileContentInfo {
    pub fn new(hash: ContentHash, length: Option<u64>) -> Self {
        Self { hash, length }
    }

    /// Content info for a file declared not to exist.
    pub fn absent() -> Self {
        Self {
            hash: ContentHash::AbsentFile,
            length: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.hash.is_absent_file()
    }
}

/// One member of a sealed directory together with its declared content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedDirectoryFile {
    pub path: PathBuf,
    pub file: FileHandle,
    pub content_info: FileContentInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_path_is_byte_exact() {
        let handle = FileHandle::new("/out/a/b.txt", 1);
        assert!(handle.matches_path(Path::new("/out/a/b.txt")));
        // Path equality would normalize the doubled separator; identity checks must not.
        assert!(!handle.matches_path(Path::new("/out/a//b.txt")));
        assert!(!handle.matches_path(Path::new("/out/A/b.txt")));
    }

    #[test]
    fn test_empty_handle_is_invalid() {
        assert!(!FileHandle::new("", 0).is_valid());
        assert!(!DirectoryHandle::new("", 3).is_valid());
        assert!(FileHandle::new("/src/x", 0).is_valid());
    }

    #[test]
    fn test_rewrite_count_defaults_to_zero() {
        let handle: FileHandle = serde_json::from_str(r#"{"path":"/src/main.c"}"#).unwrap();
        assert_eq!(handle.rewrite_count, 0);
        assert!(!handle.is_output());
    }
}
