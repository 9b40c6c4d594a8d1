//! File materialization and sealed directory executors.

use crate::error::{ExecutionError, ExecutionResult};
use crate::sealed_directory::sealed_directory_content;
use crate::state::ServerState;
use conduit_core::SealedDirectoryFile;
use conduit_core::protocol::{GetSealedDirectoryContentCommand, MaterializeFileCommand};

/// Materialize one file, checking the handle against the declared path.
pub async fn materialize_file(
    state: &ServerState,
    command: MaterializeFileCommand,
) -> ExecutionResult<bool> {
    let materialized = state
        .materializer
        .materialize(command.file.as_ref(), &command.full_path)
        .await?;

    if materialized {
        Ok(true)
    } else {
        Err(ExecutionError::MaterializationFailed {
            path: command.full_path,
        })
    }
}

/// List a sealed directory with the declared content of every member.
pub async fn get_sealed_directory_content(
    state: &ServerState,
    command: GetSealedDirectoryContentCommand,
) -> ExecutionResult<Vec<SealedDirectoryFile>> {
    sealed_directory_content(&state.file_access, &command.directory, &command.full_path).await
}
