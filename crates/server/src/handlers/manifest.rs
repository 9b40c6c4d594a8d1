//! Build manifest executors.

use crate::error::{ExecutionError, ExecutionResult};
use crate::state::ServerState;
use conduit_core::protocol::{
    GenerateBuildManifestFileListCommand, RegisterBuildManifestHashesCommand,
};
use conduit_core::{BuildManifestEntry, BuildManifestFileList};
use tracing::{info, warn};

/// Resolve manifest hashes for every file of the request.
///
/// Resolved entries are recorded with the manifest generator. The output is
/// the list of entries that failed, each carrying an unknown manifest hash.
pub async fn register_build_manifest_hashes(
    state: &ServerState,
    command: RegisterBuildManifestHashesCommand,
) -> ExecutionResult<Vec<BuildManifestEntry>> {
    let total = command.files.len();
    let manifest_type = state.resolver.manifest_hash_type();
    let resolved = state.resolver.resolve_all(command.entries()).await;

    let (succeeded, failed): (Vec<_>, Vec<_>) = resolved
        .into_iter()
        .partition(|entry| entry.is_valid_for(manifest_type));

    if !succeeded.is_empty() {
        state.manifest_generator.record_files(&succeeded);
    }

    if failed.is_empty() {
        info!(drop = %command.drop_name, total, "registered build manifest hashes");
    } else {
        warn!(
            drop = %command.drop_name,
            total,
            failed = failed.len(),
            "some build manifest hashes could not be resolved"
        );
    }

    Ok(failed)
}

/// Generate the manifest file list of a drop.
pub async fn generate_build_manifest_file_list(
    state: &ServerState,
    command: GenerateBuildManifestFileListCommand,
) -> ExecutionResult<BuildManifestFileList> {
    state
        .manifest_generator
        .generate_file_list(&command.drop_name)
        .map_err(ExecutionError::ManifestGeneration)
}
