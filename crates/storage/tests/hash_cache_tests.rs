// Persistent hash cache behaviour shared by every backend.

mod common;

use common::{hash_pair, seeded_bytes};
use conduit_storage::{
    FilesystemHashCache, HashCacheLookup, HashCacheStore, MemoryHashCache, PersistentHashCache,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn exercise_roundtrip(cache: Arc<dyn PersistentHashCache>) {
    cache.ensure_loaded().await.unwrap();

    let (source, manifest) = hash_pair(b"roundtrip");
    assert!(cache.get(&source).await.unwrap().is_none());
    cache.put(&source, &manifest).await.unwrap();
    assert_eq!(cache.get(&source).await.unwrap(), Some(manifest));

    // Overwrite with the same value is harmless.
    cache.put(&source, &manifest).await.unwrap();
    assert_eq!(cache.get(&source).await.unwrap(), Some(manifest));
}

#[tokio::test]
async fn test_memory_backend_roundtrip() {
    exercise_roundtrip(Arc::new(MemoryHashCache::new())).await;
}

#[tokio::test]
async fn test_filesystem_backend_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    exercise_roundtrip(Arc::new(FilesystemHashCache::new(temp_dir.path()))).await;
}

#[tokio::test]
async fn test_filesystem_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    let cache = Arc::new(FilesystemHashCache::new(temp_dir.path()));
    cache.ensure_loaded().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32u64 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            // Every fourth writer targets the same entry.
            let data = if i % 4 == 0 {
                seeded_bytes(0, 64)
            } else {
                seeded_bytes(i, 64)
            };
            let (source, manifest) = hash_pair(&data);
            cache.put(&source, &manifest).await.unwrap();
            (source, manifest)
        }));
    }

    for handle in handles {
        let (source, manifest) = handle.await.unwrap();
        assert_eq!(cache.get(&source).await.unwrap(), Some(manifest));
    }

    // No temp files left behind after renames.
    let mut stack = vec![temp_dir.path().to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let name = entry.file_name().to_string_lossy().into_owned();
                assert!(!name.contains(".tmp."), "leftover temp file {name}");
            }
        }
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_filesystem_unwritable_root_fails_to_load() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("ro");
    std::fs::create_dir(&root).unwrap();
    std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o555)).unwrap();

    // Root ignores permission bits; nothing to assert in that case.
    if std::fs::write(root.join("write-check"), b"").is_ok() {
        return;
    }

    let cache = FilesystemHashCache::new(&root);
    assert!(cache.ensure_loaded().await.is_err());

    std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();
}
