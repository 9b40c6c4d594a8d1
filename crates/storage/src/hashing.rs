//! Streaming file hashing.

use conduit_core::{ContentHash, ContentHasher, HASH_READ_CHUNK_SIZE, HashType};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Digests of one file under one or more algorithms.
#[derive(Clone, Debug)]
pub struct FileHashes {
    pub length: u64,
    hashes: Vec<ContentHash>,
}

impl FileHashes {
    /// Digest computed with `hash_type`, if it was requested.
    pub fn get(&self, hash_type: HashType) -> Option<ContentHash> {
        self.hashes
            .iter()
            .copied()
            .find(|hash| hash.hash_type() == Some(hash_type))
    }
}

/// Hash a file under every requested algorithm in a single pass.
///
/// The file is read in [`HASH_READ_CHUNK_SIZE`] chunks. Duplicate algorithms
/// are hashed once.
pub async fn hash_file(path: &Path, hash_types: &[HashType]) -> std::io::Result<FileHashes> {
    let mut hashers: Vec<ContentHasher> = Vec::with_capacity(hash_types.len());
    for hash_type in hash_types {
        if !hashers.iter().any(|h| h.hash_type() == *hash_type) {
            hashers.push(hash_type.hasher());
        }
    }

    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; HASH_READ_CHUNK_SIZE];
    let mut length = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        length += n as u64;
        for hasher in &mut hashers {
            hasher.update(&buf[..n]);
        }
    }

    Ok(FileHashes {
        length,
        hashes: hashers.into_iter().map(|h| h.finalize()).collect(),
    })
}
