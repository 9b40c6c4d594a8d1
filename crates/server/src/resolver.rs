//! Manifest hash resolution.
//!
//! Given a file whose build-time hash is known, produce its manifest hash by
//! trying, in order:
//!
//! 1. the in-memory cache,
//! 2. the persistent cross-build cache (checked for usability once per
//!    resolver lifetime),
//! 3. hashing the file on local disk, materializing it first if needed.
//!
//! Local hashing retries with exponential backoff while the file is not yet
//! visible or reads fail. Successful results are written through to both
//! caches; failures are never cached.

use crate::error::ResolveError;
use crate::hash_cache::InMemoryHashCache;
use crate::materialize::MaterializationCoordinator;
use crate::metrics;
use conduit_core::config::ResolverConfig;
use conduit_core::{BuildManifestEntry, ContentHash, HashType};
use conduit_storage::{PersistentHashCache, hash_file};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

pub struct ManifestHashResolver {
    config: ResolverConfig,
    memory: InMemoryHashCache,
    persistent: Option<Arc<dyn PersistentHashCache>>,
    /// Set by the first caller to reach the persistent tier.
    persistent_checked: AtomicBool,
    /// Cleared when the load step fails.
    persistent_usable: AtomicBool,
    materializer: Arc<MaterializationCoordinator>,
}

impl ManifestHashResolver {
    pub fn new(
        config: ResolverConfig,
        materializer: Arc<MaterializationCoordinator>,
        persistent: Option<Arc<dyn PersistentHashCache>>,
    ) -> Self {
        Self {
            config,
            memory: InMemoryHashCache::new(),
            persistent,
            persistent_checked: AtomicBool::new(false),
            persistent_usable: AtomicBool::new(true),
            materializer,
        }
    }

    pub fn manifest_hash_type(&self) -> HashType {
        self.config.manifest_hash_type
    }

    pub fn memory_cache(&self) -> &InMemoryHashCache {
        &self.memory
    }

    /// Whether the persistent tier is configured and has not failed to load.
    pub fn persistent_cache_usable(&self) -> bool {
        self.persistent.is_some() && self.persistent_usable.load(Ordering::Acquire)
    }

    /// Resolve one entry, producing a new entry with the manifest hash set.
    ///
    /// Failures are logged and yield an entry whose manifest hash is
    /// [`ContentHash::Unknown`].
    pub async fn resolve(&self, entry: &BuildManifestEntry) -> BuildManifestEntry {
        match self.try_resolve(entry).await {
            Ok(hash) => entry.with_build_manifest_hash(hash),
            Err(e) => {
                metrics::MANIFEST_HASH_COMPUTATION_FAILURES.inc();
                warn!(
                    drop = %entry.drop_name,
                    path = %entry.full_file_path.display(),
                    error = %e,
                    "failed to resolve manifest hash"
                );
                entry.with_build_manifest_hash(ContentHash::Unknown)
            }
        }
    }

    /// Resolve every entry concurrently.
    ///
    /// Output order matches input order. One entry failing, or even
    /// panicking, never affects its siblings.
    pub async fn resolve_all(
        self: &Arc<Self>,
        entries: Vec<BuildManifestEntry>,
    ) -> Vec<BuildManifestEntry> {
        let handles: Vec<_> = entries
            .iter()
            .cloned()
            .map(|entry| {
                let resolver = Arc::clone(self);
                tokio::spawn(async move { resolver.resolve(&entry).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        entries
            .into_iter()
            .zip(results)
            .map(|(entry, result)| match result {
                Ok(resolved) => resolved,
                Err(join_err) => {
                    metrics::MANIFEST_HASH_COMPUTATION_FAILURES.inc();
                    error!(
                        path = %entry.full_file_path.display(),
                        error = %join_err,
                        "manifest hash resolution task failed"
                    );
                    entry.with_build_manifest_hash(ContentHash::Unknown)
                }
            })
            .collect()
    }

    /// Resolve the manifest hash of one entry.
    pub async fn try_resolve(
        &self,
        entry: &BuildManifestEntry,
    ) -> Result<ContentHash, ResolveError> {
        let source = entry.source_hash;
        if !source.is_digest() {
            return Err(ResolveError::InvalidSourceHash(source));
        }

        if let Some(hash) = self.memory.get(&source) {
            metrics::MANIFEST_HASH_MEMORY_HITS.inc();
            return Ok(hash);
        }

        if let Some(hash) = self.lookup_persistent(&source).await {
            metrics::MANIFEST_HASH_PERSISTENT_HITS.inc();
            return Ok(self.remember(source, hash));
        }

        let hash = self.compute_locally(entry).await?;
        let stored = self.remember(source, hash);
        self.store_persistent(&source, &stored).await;
        Ok(stored)
    }

    /// The persistent cache, if configured and usable.
    ///
    /// The first caller runs the load step; concurrent callers do not wait
    /// for it.
    async fn persistent_cache(&self) -> Option<&Arc<dyn PersistentHashCache>> {
        let cache = self.persistent.as_ref()?;

        if self
            .persistent_checked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && let Err(e) = cache.ensure_loaded().await
        {
            self.persistent_usable.store(false, Ordering::Release);
            warn!(
                backend = cache.backend_name(),
                error = %e,
                "persistent hash cache is unusable, continuing without it"
            );
        }

        self.persistent_usable.load(Ordering::Acquire).then_some(cache)
    }

    async fn lookup_persistent(&self, source: &ContentHash) -> Option<ContentHash> {
        let cache = self.persistent_cache().await?;
        match cache.get(source).await {
            Ok(Some(hash)) if hash.hash_type() == Some(self.config.manifest_hash_type) => {
                Some(hash)
            }
            Ok(Some(hash)) => {
                debug!(
                    source = %source,
                    cached = %hash,
                    "ignoring persisted hash of a different algorithm"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    backend = cache.backend_name(),
                    source = %source,
                    error = %e,
                    "persistent hash cache lookup failed"
                );
                None
            }
        }
    }

    async fn store_persistent(&self, source: &ContentHash, manifest: &ContentHash) {
        let Some(cache) = self.persistent_cache().await else {
            return;
        };
        match cache.put(source, manifest).await {
            Ok(()) => metrics::MANIFEST_HASH_PERSISTENT_WRITES.inc(),
            Err(e) => warn!(
                backend = cache.backend_name(),
                source = %source,
                error = %e,
                "persistent hash cache store failed"
            ),
        }
    }

    fn remember(&self, source: ContentHash, manifest: ContentHash) -> ContentHash {
        metrics::MANIFEST_HASH_MEMORY_WRITES.inc();
        self.memory.insert(source, manifest)
    }

    async fn compute_locally(
        &self,
        entry: &BuildManifestEntry,
    ) -> Result<ContentHash, ResolveError> {
        let path = entry.full_file_path.as_path();

        if !is_present(path).await {
            match self.materializer.materialize_best_effort(path).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(ResolveError::MaterializationFailed {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "materialization errored");
                    return Err(ResolveError::MaterializationFailed {
                        path: path.to_path_buf(),
                    });
                }
            }
        }

        metrics::MANIFEST_HASH_LOCAL_COMPUTATIONS.inc();

        let manifest_type = self.config.manifest_hash_type;
        let verify_type = if self.config.verify_source_hash {
            entry.source_hash.hash_type()
        } else {
            None
        };
        let hash_types: Vec<HashType> =
            std::iter::once(manifest_type).chain(verify_type).collect();

        let max_attempts = self.config.max_attempts;
        for attempt in 0..max_attempts {
            let delay = self.config.retry_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let last = attempt + 1 == max_attempts;

            if !is_present(path).await {
                if last {
                    return Err(ResolveError::FileNotFound {
                        path: path.to_path_buf(),
                        attempts: max_attempts,
                    });
                }
                debug!(path = %path.display(), attempt, "file not visible yet, retrying");
                continue;
            }

            let hashes = match hash_file(path, &hash_types).await {
                Ok(hashes) => hashes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && last => {
                    return Err(ResolveError::FileNotFound {
                        path: path.to_path_buf(),
                        attempts: max_attempts,
                    });
                }
                Err(e) if last => {
                    return Err(ResolveError::HashingFailed {
                        path: path.to_path_buf(),
                        attempts: max_attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "hashing failed, retrying"
                    );
                    continue;
                }
            };

            if let Some(build_type) = verify_type {
                let actual = hashes.get(build_type).unwrap_or(ContentHash::Unknown);
                if actual != entry.source_hash {
                    return Err(ResolveError::ContentMismatch {
                        path: path.to_path_buf(),
                        expected: entry.source_hash,
                        actual,
                    });
                }
            }

            return hashes.get(manifest_type).ok_or_else(|| ResolveError::HashingFailed {
                path: path.to_path_buf(),
                attempts: attempt + 1,
                source: std::io::Error::other("manifest digest was not computed"),
            });
        }

        Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
            attempts: max_attempts,
        })
    }
}

async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
