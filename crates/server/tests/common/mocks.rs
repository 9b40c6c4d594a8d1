//! Mock collaborators with call counters and failure injection.

use async_trait::async_trait;
use conduit_core::{ContentHash, DirectoryHandle, FileContentInfo, FileHandle};
use conduit_storage::{
    FileAccess, HashCacheLookup, HashCacheStore, StorageError, StorageResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Duration;

/// File access whose "remote store" is an in-memory map of path to bytes.
///
/// Materializing a path writes its registered bytes to disk. Paths without
/// registered bytes fail to materialize.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockFileAccess {
    remote: Mutex<HashMap<PathBuf, Vec<u8>>>,
    handles: Mutex<HashMap<PathBuf, FileHandle>>,
    seals: Mutex<HashMap<PathBuf, Vec<FileHandle>>>,
    contents: Mutex<HashMap<PathBuf, Option<FileContentInfo>>>,
    /// Report success without writing anything to disk.
    pub lie_about_materialization: AtomicBool,
    pub materialize_file_calls: AtomicUsize,
    pub materialize_by_path_calls: AtomicUsize,
    pub content_queries: AtomicUsize,
}

#[allow(dead_code)]
impl MockFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` materializable with `data`.
    pub fn add_remote(&self, path: &Path, data: &[u8]) {
        self.remote
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
    }

    /// Make `resolve_file` return `handle` for its path.
    pub fn add_handle(&self, handle: FileHandle) {
        self.handles
            .lock()
            .unwrap()
            .insert(handle.path.clone(), handle);
    }

    pub fn add_seal(&self, directory: &DirectoryHandle, members: Vec<FileHandle>) {
        self.seals
            .lock()
            .unwrap()
            .insert(directory.path.clone(), members);
    }

    pub fn set_content(&self, path: &Path, content: Option<FileContentInfo>) {
        self.contents
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content);
    }

    pub fn materialize_calls(&self) -> usize {
        self.materialize_file_calls.load(Ordering::SeqCst)
            + self.materialize_by_path_calls.load(Ordering::SeqCst)
    }

    fn place(&self, path: &Path) -> StorageResult<bool> {
        if self.lie_about_materialization.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let data = self.remote.lock().unwrap().get(path).cloned();
        match data {
            Some(data) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl FileAccess for MockFileAccess {
    async fn materialize_file(&self, file: &FileHandle) -> StorageResult<bool> {
        self.materialize_file_calls.fetch_add(1, Ordering::SeqCst);
        self.place(&file.path)
    }

    async fn materialize_by_path(&self, path: &Path) -> StorageResult<bool> {
        self.materialize_by_path_calls.fetch_add(1, Ordering::SeqCst);
        self.place(path)
    }

    async fn resolve_file(&self, path: &Path) -> StorageResult<Option<FileHandle>> {
        Ok(self.handles.lock().unwrap().get(path).cloned())
    }

    async fn list_sealed_directory(
        &self,
        directory: &DirectoryHandle,
    ) -> StorageResult<Vec<FileHandle>> {
        self.seals
            .lock()
            .unwrap()
            .get(&directory.path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(directory.path.display().to_string()))
    }

    async fn try_get_file_content(
        &self,
        file: &FileHandle,
        _allow_undeclared: bool,
    ) -> StorageResult<Option<FileContentInfo>> {
        self.content_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(&file.path)
            .copied()
            .flatten())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Persistent hash cache with injectable load, read and write failures.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockHashCache {
    entries: Mutex<HashMap<ContentHash, ContentHash>>,
    pub fail_load: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    /// Delay inside the load step, to widen first-caller races.
    pub load_delay_ms: AtomicUsize,
    pub load_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub put_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_load() -> Self {
        let cache = Self::default();
        cache.fail_load.store(true, Ordering::SeqCst);
        cache
    }

    pub fn insert(&self, source: ContentHash, manifest: ContentHash) {
        self.entries.lock().unwrap().insert(source, manifest);
    }

    pub fn stored(&self, source: &ContentHash) -> Option<ContentHash> {
        self.entries.lock().unwrap().get(source).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl HashCacheLookup for MockHashCache {
    async fn ensure_loaded(&self) -> StorageResult<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("mock cache failed to load".to_string()));
        }
        Ok(())
    }

    async fn get(&self, source: &ContentHash) -> StorageResult<Option<ContentHash>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("mock get failure".to_string()));
        }
        Ok(self.stored(source))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait]
impl HashCacheStore for MockHashCache {
    async fn put(&self, source: &ContentHash, manifest: &ContentHash) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("mock put failure".to_string()));
        }
        self.insert(*source, *manifest);
        Ok(())
    }
}
