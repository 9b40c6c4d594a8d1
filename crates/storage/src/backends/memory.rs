//! Process-local hash cache.
//!
//! Behaves like a persistent cache that happens to be empty at startup.
//! Useful for development and tests.

use crate::error::{StorageError, StorageResult};
use crate::traits::{HashCacheLookup, HashCacheStore};
use async_trait::async_trait;
use conduit_core::ContentHash;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryHashCache {
    entries: DashMap<ContentHash, ContentHash>,
}

impl MemoryHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl HashCacheLookup for MemoryHashCache {
    async fn get(&self, source: &ContentHash) -> StorageResult<Option<ContentHash>> {
        Ok(self.entries.get(source).map(|entry| *entry.value()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl HashCacheStore for MemoryHashCache {
    async fn put(&self, source: &ContentHash, manifest: &ContentHash) -> StorageResult<()> {
        if !source.is_digest() || !manifest.is_digest() {
            return Err(StorageError::InvalidKey(format!(
                "sentinel hashes cannot be cached: {source} -> {manifest}"
            )));
        }
        self.entries.insert(*source, *manifest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::HashType;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MemoryHashCache::new();
        let source = ContentHash::compute(HashType::Blake3, b"src");
        let manifest = ContentHash::compute(HashType::Sha256, b"src");

        assert_eq!(cache.get(&source).await.unwrap(), None);
        cache.put(&source, &manifest).await.unwrap();
        assert_eq!(cache.get(&source).await.unwrap(), Some(manifest));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_sentinels() {
        let cache = MemoryHashCache::new();
        let source = ContentHash::compute(HashType::Blake3, b"src");
        assert!(cache.put(&source, &ContentHash::AbsentFile).await.is_err());
        assert!(cache.is_empty());
    }
}
