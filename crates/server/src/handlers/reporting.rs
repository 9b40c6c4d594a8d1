//! Statistics and log message executors.

use crate::error::ExecutionResult;
use crate::state::ServerState;
use conduit_core::protocol::{LogMessageCommand, ReportStatisticsCommand};

pub async fn report_statistics(
    state: &ServerState,
    command: ReportStatisticsCommand,
) -> ExecutionResult<bool> {
    state.statistics.report(&command.stats);
    Ok(true)
}

/// Route a client message to the warning or informational channel.
pub async fn log_message(
    _state: &ServerState,
    command: LogMessageCommand,
) -> ExecutionResult<bool> {
    if command.is_warning {
        tracing::warn!(target: "conduit::client", "{}", command.message);
    } else {
        tracing::info!(target: "conduit::client", "{}", command.message);
    }
    Ok(true)
}
