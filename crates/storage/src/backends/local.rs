//! File access backed directly by the local disk.
//!
//! There is no remote content store behind this backend: a file is
//! "materialized" exactly when it already exists, sealed directories are
//! whatever regular files currently sit beneath the directory, and declared
//! content is recomputed from the bytes on disk.

use crate::error::{StorageError, StorageResult};
use crate::hashing::hash_file;
use crate::traits::FileAccess;
use async_trait::async_trait;
use conduit_core::{DirectoryHandle, FileContentInfo, FileHandle, HashType};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

pub struct LocalFileAccess {
    build_hash_type: HashType,
}

impl LocalFileAccess {
    /// `build_hash_type` is the algorithm used for declared content hashes.
    pub fn new(build_hash_type: HashType) -> Self {
        Self { build_hash_type }
    }

    pub fn build_hash_type(&self) -> HashType {
        self.build_hash_type
    }
}

async fn is_regular_file(path: &Path) -> StorageResult<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

#[async_trait]
impl FileAccess for LocalFileAccess {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn materialize_file(&self, file: &FileHandle) -> StorageResult<bool> {
        is_regular_file(&file.path).await
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn materialize_by_path(&self, path: &Path) -> StorageResult<bool> {
        is_regular_file(path).await
    }

    async fn resolve_file(&self, path: &Path) -> StorageResult<Option<FileHandle>> {
        if is_regular_file(path).await? {
            Ok(Some(FileHandle::new(path, 0)))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list_sealed_directory(
        &self,
        directory: &DirectoryHandle,
    ) -> StorageResult<Vec<FileHandle>> {
        let mut files = Vec::new();
        let mut pending: Vec<PathBuf> = vec![directory.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::NotFound(format!(
                        "sealed directory {}",
                        dir.display()
                    )));
                }
                Err(e) => return Err(StorageError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(FileHandle::new(entry.path(), 0));
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = files.len(), "listed sealed directory");
        Ok(files)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn try_get_file_content(
        &self,
        file: &FileHandle,
        _allow_undeclared: bool,
    ) -> StorageResult<Option<FileContentInfo>> {
        match hash_file(&file.path, &[self.build_hash_type]).await {
            Ok(hashes) => Ok(hashes
                .get(self.build_hash_type)
                .map(|hash| FileContentInfo::new(hash, Some(hashes.length)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Some(FileContentInfo::absent()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
