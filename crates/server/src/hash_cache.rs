//! Process-lifetime map from build-time hash to manifest hash.

use conduit_core::ContentHash;
use dashmap::DashMap;

/// In-memory hash cache.
///
/// Grows monotonically and is never evicted; its size is bounded by the number
/// of distinct files hashed in one build. The first value recorded for a source
/// hash wins, so later concurrent writers observe the same manifest hash.
#[derive(Default)]
pub struct InMemoryHashCache {
    entries: DashMap<ContentHash, ContentHash>,
}

impl InMemoryHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &ContentHash) -> Option<ContentHash> {
        self.entries.get(source).map(|entry| *entry.value())
    }

    /// Record `manifest` for `source` unless a value is already present.
    ///
    /// Returns the value the cache holds afterwards.
    pub fn insert(&self, source: ContentHash, manifest: ContentHash) -> ContentHash {
        *self.entries.entry(source).or_insert(manifest).value()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
