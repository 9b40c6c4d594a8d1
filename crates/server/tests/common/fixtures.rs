//! Test data helpers.

use conduit_core::protocol::BuildManifestFileRequest;
use conduit_core::{BuildManifestEntry, ContentHash, HashType};
use std::path::Path;

/// Build-time hash of `data` (blake3).
#[allow(dead_code)]
pub fn build_hash(data: &[u8]) -> ContentHash {
    ContentHash::compute(HashType::Blake3, data)
}

/// Manifest hash of `data` (sha256).
#[allow(dead_code)]
pub fn manifest_hash(data: &[u8]) -> ContentHash {
    ContentHash::compute(HashType::Sha256, data)
}

/// An unresolved entry whose source hash matches `data`.
#[allow(dead_code)]
pub fn entry_for(drop: &str, relative: &str, full_path: &Path, data: &[u8]) -> BuildManifestEntry {
    BuildManifestEntry::new(drop, relative, build_hash(data), full_path)
}

/// A register-hashes request line whose source hash matches `data`.
#[allow(dead_code)]
pub fn file_request(relative: &str, full_path: &Path, data: &[u8]) -> BuildManifestFileRequest {
    BuildManifestFileRequest {
        relative_path: relative.to_string(),
        source_hash: build_hash(data),
        full_path: full_path.to_path_buf(),
    }
}
