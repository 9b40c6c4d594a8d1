//! Collaborator trait definitions.
//!
//! The server never owns file content or cross-build state. It reaches the
//! orchestrator's materialization engine through [`FileAccess`], the
//! persistent hash cache through the [`HashCacheLookup`]/[`HashCacheStore`]
//! capability pair, and the manifest file-list producer through
//! [`BuildManifestGenerator`].

use crate::error::StorageResult;
use async_trait::async_trait;
use conduit_core::{
    BuildManifestEntry, BuildManifestFileList, ContentHash, DirectoryHandle, FileContentInfo,
    FileHandle,
};
use std::path::Path;

/// Access to the orchestrator's file materialization engine.
#[async_trait]
pub trait FileAccess: Send + Sync + 'static {
    /// Place the content of a known file on local disk.
    ///
    /// Returns `Ok(false)` when the engine could not produce the file.
    async fn materialize_file(&self, file: &FileHandle) -> StorageResult<bool>;

    /// Place a file on local disk given only its path.
    ///
    /// The engine has to infer the file's identity from previously sealed
    /// directories, so this succeeds less often than [`materialize_file`].
    ///
    /// [`materialize_file`]: FileAccess::materialize_file
    async fn materialize_by_path(&self, path: &Path) -> StorageResult<bool>;

    /// Look up the handle the orchestrator tracks for `path`, if any.
    async fn resolve_file(&self, path: &Path) -> StorageResult<Option<FileHandle>>;

    /// Members of a sealed directory.
    async fn list_sealed_directory(&self, directory: &DirectoryHandle)
    -> StorageResult<Vec<FileHandle>>;

    /// Declared content of a file.
    ///
    /// `allow_undeclared` permits reads of files the caller did not declare
    /// as inputs. `None` means the engine has no content for the file.
    async fn try_get_file_content(
        &self,
        file: &FileHandle,
        allow_undeclared: bool,
    ) -> StorageResult<Option<FileContentInfo>>;

    /// Static backend identifier used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Read side of the persistent hash cache.
#[async_trait]
pub trait HashCacheLookup: Send + Sync + 'static {
    /// Make the cache ready for use.
    ///
    /// Backends may need a separate, possibly slow, load step. An error means
    /// the cache is unusable for the rest of the process.
    async fn ensure_loaded(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Manifest hash previously recorded for `source`.
    async fn get(&self, source: &ContentHash) -> StorageResult<Option<ContentHash>>;

    /// Static backend identifier used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Write side of the persistent hash cache.
#[async_trait]
pub trait HashCacheStore: Send + Sync + 'static {
    /// Record the manifest hash computed for `source`.
    async fn put(&self, source: &ContentHash, manifest: &ContentHash) -> StorageResult<()>;
}

/// A persistent hash cache with both capabilities.
///
/// Implemented automatically for every type providing lookup and store.
pub trait PersistentHashCache: HashCacheLookup + HashCacheStore {}

impl<T: HashCacheLookup + HashCacheStore + ?Sized> PersistentHashCache for T {}

/// Producer of per-drop build manifest file lists.
pub trait BuildManifestGenerator: Send + Sync + 'static {
    /// Record resolved entries for later file-list generation.
    fn record_files(&self, entries: &[BuildManifestEntry]);

    /// Generate the file list of a drop.
    ///
    /// The error string is surfaced to the client verbatim.
    fn generate_file_list(&self, drop_name: &str) -> Result<BuildManifestFileList, String>;
}
