use conduit_core::{ContentHash, HashType};
use std::path::Path;

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// Build-time (blake3) and manifest (sha256) hashes of the same bytes.
#[allow(dead_code)]
pub fn hash_pair(data: &[u8]) -> (ContentHash, ContentHash) {
    (
        ContentHash::compute(HashType::Blake3, data),
        ContentHash::compute(HashType::Sha256, data),
    )
}

/// Write `files` (relative path, contents) beneath `root`.
#[allow(dead_code)]
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        assert_eq!(seeded_bytes(42, 100), seeded_bytes(42, 100));
        assert_ne!(seeded_bytes(42, 100), seeded_bytes(43, 100));
    }
}
