#[path = "../src/ipc_client.rs"]
#[allow(dead_code)] // Some items are used by the binary but not by tests
mod ipc_client;

use conduit_core::config::{AppConfig, HashCacheConfig};
use conduit_core::protocol::{
    BuildManifestFileRequest, GenerateBuildManifestFileListCommand,
    GetSealedDirectoryContentCommand, LogMessageCommand, MaterializeFileCommand,
    RegisterBuildManifestHashesCommand, ReportStatisticsCommand,
};
use conduit_core::{ContentHash, DirectoryHandle, HashType};
use conduit_server::{Dispatcher, IpcServer, ServerState};
use conduit_storage::{LocalFileAccess, MemoryHashCache};
use ipc_client::IpcClient;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

struct Harness {
    temp_dir: TempDir,
    socket_path: PathBuf,
    state: ServerState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Harness {
    async fn start() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_testing();
        config.server.socket_path = temp_dir.path().join("conduit.sock");
        config.hash_cache = HashCacheConfig::Memory;

        let state = ServerState::new(
            config,
            Arc::new(LocalFileAccess::new(HashType::Blake3)),
            Some(Arc::new(MemoryHashCache::new())),
        );
        let server = IpcServer::bind(Dispatcher::new(state.clone())).unwrap();
        let socket_path = server.socket_path().to_path_buf();
        let (shutdown, rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        Self {
            temp_dir,
            socket_path,
            state,
            shutdown: Some(shutdown),
        }
    }

    fn write(&self, relative: &str, data: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn client(&self) -> IpcClient {
        IpcClient::connect(&self.socket_path, 3).await.unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn request(relative: &str, path: &Path, data: &[u8]) -> BuildManifestFileRequest {
    BuildManifestFileRequest {
        relative_path: relative.to_string(),
        source_hash: ContentHash::compute(HashType::Blake3, data),
        full_path: path.to_path_buf(),
    }
}

#[tokio::test]
async fn test_register_then_generate_file_list() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;
    let a = harness.write("out/a.txt", b"alpha");
    let b = harness.write("out/b.txt", b"bravo");

    let failed = client
        .send(RegisterBuildManifestHashesCommand {
            drop_name: "release".to_string(),
            files: vec![
                request("b.txt", &b, b"bravo"),
                request("a.txt", &a, b"alpha"),
            ],
        })
        .await
        .unwrap();
    assert!(failed.is_empty());

    let list = client
        .send(GenerateBuildManifestFileListCommand {
            drop_name: "release".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(list.drop_name, "release");
    assert_eq!(list.files.len(), 2);
    assert_eq!(list.files[0].relative_path, "a.txt");
    assert_eq!(
        list.files[0].hash,
        ContentHash::compute(HashType::Sha256, b"alpha")
    );
}

#[tokio::test]
async fn test_register_reports_unresolved_entries() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;
    let present = harness.write("out/present.txt", b"here");
    let missing = harness.temp_dir.path().join("out/missing.txt");

    let failed = client
        .send(RegisterBuildManifestHashesCommand {
            drop_name: "release".to_string(),
            files: vec![
                request("present.txt", &present, b"here"),
                request("missing.txt", &missing, b"gone"),
            ],
        })
        .await
        .unwrap();

    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].full_file_path, missing);
    assert!(failed[0].build_manifest_hash.is_unknown());
}

#[tokio::test]
async fn test_execution_error_becomes_client_error() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    let err = client
        .send(MaterializeFileCommand {
            file: None,
            full_path: harness.temp_dir.path().join("nope.bin"),
        })
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("materialize_file failed"), "{message}");
    assert!(message.contains("nope.bin"), "{message}");

    // The connection survives a failed command.
    assert!(
        client
            .send(LogMessageCommand {
                message: "after failure".to_string(),
                is_warning: false,
            })
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_sealed_directory_over_local_disk() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;
    harness.write("seal/x.txt", b"x");
    harness.write("seal/nested/y.txt", b"y");
    let directory = harness.temp_dir.path().join("seal");

    let files = client
        .send(GetSealedDirectoryContentCommand {
            directory: DirectoryHandle::new(&directory, 1),
            full_path: directory.clone(),
        })
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.content_info.hash.is_digest()));
}

#[tokio::test]
async fn test_sequential_statistics_reports() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    for value in [3, 4] {
        let stats = BTreeMap::from([("bytes".to_string(), value)]);
        assert!(client.send(ReportStatisticsCommand { stats }).await.unwrap());
    }

    assert_eq!(harness.state.statistics.get("bytes"), Some(7));
}

#[tokio::test]
async fn test_connect_fails_without_server() {
    let temp_dir = tempfile::tempdir().unwrap();
    let socket = temp_dir.path().join("absent.sock");

    let err = match IpcClient::connect(&socket, 1).await {
        Ok(_) => panic!("connected to a socket that does not exist"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("absent.sock"));
}
