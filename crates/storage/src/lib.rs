//! Collaborator abstractions and backends for the Conduit server.
//!
//! This crate provides:
//! - Capability traits for file materialization, the persistent hash cache
//!   and build manifest generation
//! - Streaming multi-algorithm file hashing
//! - Backends: filesystem and memory hash caches, local-disk file access

pub mod backends;
pub mod error;
pub mod hashing;
pub mod traits;

pub use backends::{
    filesystem::FilesystemHashCache, local::LocalFileAccess, memory::MemoryHashCache,
};
pub use error::{StorageError, StorageResult};
pub use hashing::{FileHashes, hash_file};
pub use traits::{
    BuildManifestGenerator, FileAccess, HashCacheLookup, HashCacheStore, PersistentHashCache,
};

use conduit_core::config::HashCacheConfig;
use std::sync::Arc;

/// Create the persistent hash cache described by configuration.
///
/// Returns `None` when the cache is disabled. Backends are constructed
/// lazily: loading happens on first use by the resolver.
pub fn hash_cache_from_config(
    config: &HashCacheConfig,
) -> StorageResult<Option<Arc<dyn PersistentHashCache>>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        HashCacheConfig::Disabled => Ok(None),
        HashCacheConfig::Memory => Ok(Some(Arc::new(MemoryHashCache::new()))),
        HashCacheConfig::Filesystem { path } => {
            Ok(Some(Arc::new(FilesystemHashCache::new(path))))
        }
    }
}
