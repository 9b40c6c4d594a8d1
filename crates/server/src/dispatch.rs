//! Command dispatch.
//!
//! Decodes a request payload into a [`Command`], routes it to its executor
//! and wraps the outcome in an [`IpcResult`]. Every executor runs through
//! [`run`], which counts the invocation (and times it, for timed commands)
//! exactly once whether it succeeds or fails.

use crate::error::ExecutionResult;
use crate::handlers;
use crate::metrics;
use crate::state::ServerState;
use conduit_core::protocol::{
    GenerateBuildManifestFileListCommand, GetSealedDirectoryContentCommand, LogMessageCommand,
    MaterializeFileCommand, RegisterBuildManifestHashesCommand, ReportStatisticsCommand,
};
use conduit_core::{Command, IpcCommand, IpcResult};
use std::future::Future;
use tracing::{debug, warn};

/// Stateless router from payloads to executors.
#[derive(Clone)]
pub struct Dispatcher {
    state: ServerState,
}

impl Dispatcher {
    pub fn new(state: ServerState) -> Self {
        metrics::register_metrics();
        Self { state }
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Execute one request payload.
    ///
    /// A payload that does not decode to a command yields an `invalid_input`
    /// result; it never panics.
    pub async fn execute(&self, payload: &[u8]) -> IpcResult {
        match Command::from_payload(payload) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                metrics::PROTOCOL_ERRORS.inc();
                warn!(error = %e, bytes = payload.len(), "malformed command payload");
                IpcResult::invalid_input(format!("failed to deserialize command: {e}"))
            }
        }
    }

    /// Execute a decoded command.
    ///
    /// # Panics
    ///
    /// Panics on [`Command::Unrecognized`]. Decoding never produces it, so
    /// only a caller constructing it directly can reach that arm.
    pub async fn dispatch(&self, command: Command) -> IpcResult {
        let state = &self.state;
        match command {
            Command::MaterializeFile(c) => {
                run::<MaterializeFileCommand, _>(handlers::materialize_file(state, c)).await
            }
            Command::RegisterBuildManifestHashes(c) => {
                run::<RegisterBuildManifestHashesCommand, _>(
                    handlers::register_build_manifest_hashes(state, c),
                )
                .await
            }
            Command::GenerateBuildManifestFileList(c) => {
                run::<GenerateBuildManifestFileListCommand, _>(
                    handlers::generate_build_manifest_file_list(state, c),
                )
                .await
            }
            Command::ReportStatistics(c) => {
                run::<ReportStatisticsCommand, _>(handlers::report_statistics(state, c)).await
            }
            Command::GetSealedDirectoryContent(c) => {
                run::<GetSealedDirectoryContentCommand, _>(
                    handlers::get_sealed_directory_content(state, c),
                )
                .await
            }
            Command::LogMessage(c) => {
                run::<LogMessageCommand, _>(handlers::log_message(state, c)).await
            }
            Command::Unrecognized => {
                panic!("contract violation: no executor for a well-formed command variant")
            }
        }
    }
}

async fn run<C, F>(executor: F) -> IpcResult
where
    C: IpcCommand,
    F: Future<Output = ExecutionResult<C::Output>>,
{
    metrics::COMMANDS_TOTAL.with_label_values(&[C::NAME]).inc();
    let timer = C::TIMED.then(|| {
        metrics::COMMAND_DURATION
            .with_label_values(&[C::NAME])
            .start_timer()
    });

    let result = executor.await;

    if let Some(timer) = timer {
        timer.observe_duration();
    }

    match result {
        Ok(output) => C::render_result(output),
        Err(e) => {
            metrics::COMMAND_FAILURES.with_label_values(&[C::NAME]).inc();
            debug!(command = C::NAME, error = %e, "command failed");
            IpcResult::execution_error(e.to_string())
        }
    }
}
