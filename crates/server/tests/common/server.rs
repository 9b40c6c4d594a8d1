//! Server test utilities.

use super::mocks::{MockFileAccess, MockHashCache};
use conduit_core::config::AppConfig;
use conduit_core::{Command, IpcCommand, IpcResult};
use conduit_server::{Dispatcher, ServerState};
use conduit_storage::{FileAccess, PersistentHashCache};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A dispatcher wired to mock collaborators and a scratch directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub dispatcher: Dispatcher,
    pub state: ServerState,
    pub file_access: Arc<MockFileAccess>,
    pub hash_cache: Arc<MockHashCache>,
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test server with custom config modifications.
    pub fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, Arc::new(MockHashCache::new()))
    }

    /// Create a test server around a prepared hash cache.
    pub fn with_hash_cache(hash_cache: MockHashCache) -> Self {
        Self::build(|_| {}, Arc::new(hash_cache))
    }

    fn build<F>(modifier: F, hash_cache: Arc<MockHashCache>) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing();
        config.server.socket_path = temp_dir.path().join("conduit.sock");
        modifier(&mut config);

        let file_access = Arc::new(MockFileAccess::new());
        let state = ServerState::new(
            config,
            file_access.clone() as Arc<dyn FileAccess>,
            Some(hash_cache.clone() as Arc<dyn PersistentHashCache>),
        );
        let dispatcher = Dispatcher::new(state.clone());

        Self {
            dispatcher,
            state,
            file_access,
            hash_cache,
            temp_dir,
        }
    }

    /// Absolute path of `relative` inside the scratch directory.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Write `data` to `relative` inside the scratch directory.
    pub fn write_file(&self, relative: &str, data: &[u8]) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, data).expect("Failed to write file");
        path
    }

    /// Serialize `command` and run it through the dispatcher.
    pub async fn execute<C: IpcCommand>(&self, command: C) -> IpcResult {
        let command: Command = command.into();
        let payload = command.to_payload().expect("Failed to serialize command");
        self.dispatcher.execute(&payload).await
    }
}
