//! Filesystem-backed persistent hash cache.
//!
//! Each entry is a small text file holding the manifest hash, stored at
//! `<root>/<algorithm>/<hex[0..2]>/<hex>` where `hex` is the source hash.
//! The cache survives across builds as long as the root directory does.

use crate::error::{StorageError, StorageResult};
use crate::traits::{HashCacheLookup, HashCacheStore};
use async_trait::async_trait;
use conduit_core::ContentHash;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Persistent hash cache rooted at a local directory.
pub struct FilesystemHashCache {
    root: PathBuf,
}

impl FilesystemHashCache {
    /// Create a cache rooted at `root`.
    ///
    /// No I/O happens until [`HashCacheLookup::ensure_loaded`] or the first
    /// read or write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `source`.
    ///
    /// Sentinel hashes cannot key an entry.
    fn entry_path(&self, source: &ContentHash) -> StorageResult<PathBuf> {
        match (source.hash_type(), source.to_hex()) {
            (Some(hash_type), Some(hex)) => Ok(self
                .root
                .join(hash_type.as_str())
                .join(&hex[..2])
                .join(hex)),
            _ => Err(StorageError::InvalidKey(format!(
                "sentinel hash cannot key a cache entry: {source}"
            ))),
        }
    }
}

#[async_trait]
impl HashCacheLookup for FilesystemHashCache {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn ensure_loaded(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Unavailable(format!(
                "cannot create hash cache root {}: {e}",
                self.root.display()
            ))
        })?;

        let metadata = fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "hash cache root is not a directory: {}",
                self.root.display()
            )));
        }

        // An unwritable root fails the load step, not every store.
        let marker = self.root.join(format!(".write-check.{}", Uuid::new_v4()));
        fs::write(&marker, b"").await.map_err(|e| {
            StorageError::Unavailable(format!(
                "hash cache root is not writable: {}: {e}",
                self.root.display()
            ))
        })?;
        fs::remove_file(&marker).await?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, source: &ContentHash) -> StorageResult<Option<ContentHash>> {
        let path = self.entry_path(source)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        text.trim()
            .parse::<ContentHash>()
            .map(Some)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[async_trait]
impl HashCacheStore for FilesystemHashCache {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put(&self, source: &ContentHash, manifest: &ContentHash) -> StorageResult<()> {
        if !manifest.is_digest() {
            return Err(StorageError::InvalidKey(format!(
                "refusing to cache sentinel manifest hash for {source}"
            )));
        }

        let path = self.entry_path(source)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a uniquely named temp file, fsync, then rename so concurrent
        // writers of the same entry never expose a partial file.
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(manifest.to_string().as_bytes()).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }
}
