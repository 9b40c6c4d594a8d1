//! Wire protocol between external tools and the server.
//!
//! A request payload is the JSON form of a [`Command`], tagged by its
//! `command` field. Each command payload type implements [`IpcCommand`],
//! which names its typed output and renders that output into the uniform
//! [`IpcResult`] envelope. On the socket, payloads travel inside frames that
//! are prefixed with a request id (see [`encode_frame`]).

use crate::artifact::{DirectoryHandle, FileHandle, SealedDirectoryFile};
use crate::hash::ContentHash;
use crate::manifest::{BuildManifestEntry, BuildManifestFileList};
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Length of the request id that prefixes every frame.
pub const REQUEST_ID_LEN: usize = 8;

/// A command payload with a typed output.
pub trait IpcCommand: Serialize + DeserializeOwned + Into<Command> {
    /// What the executor produces on success.
    type Output: Serialize + DeserializeOwned;

    /// Stable command name, used as the wire tag and the counter label.
    const NAME: &'static str;

    /// Whether the dispatcher records a duration for this command.
    const TIMED: bool = false;

    /// Wrap the executor's output into a successful result.
    fn render_result(output: Self::Output) -> IpcResult {
        match serde_json::to_value(output) {
            Ok(payload) => IpcResult::success(payload),
            Err(e) => IpcResult::execution_error(format!(
                "failed to serialize {} result: {e}",
                Self::NAME
            )),
        }
    }

    /// Decode the payload of a successful result.
    fn parse_output(payload: serde_json::Value) -> crate::Result<Self::Output> {
        serde_json::from_value(payload).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

/// The closed set of commands the server executes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    MaterializeFile(MaterializeFileCommand),
    RegisterBuildManifestHashes(RegisterBuildManifestHashesCommand),
    GenerateBuildManifestFileList(GenerateBuildManifestFileListCommand),
    ReportStatistics(ReportStatisticsCommand),
    GetSealedDirectoryContent(GetSealedDirectoryContentCommand),
    LogMessage(LogMessageCommand),
    /// Never produced by decoding: an unknown tag is a deserialization
    /// error. Reaching the dispatcher with it is a contract violation.
    #[serde(skip)]
    Unrecognized,
}

impl Command {
    /// Decode a request payload.
    pub fn from_payload(payload: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(payload).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Encode as a request payload.
    pub fn to_payload(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MaterializeFile(_) => MaterializeFileCommand::NAME,
            Self::RegisterBuildManifestHashes(_) => RegisterBuildManifestHashesCommand::NAME,
            Self::GenerateBuildManifestFileList(_) => GenerateBuildManifestFileListCommand::NAME,
            Self::ReportStatistics(_) => ReportStatisticsCommand::NAME,
            Self::GetSealedDirectoryContent(_) => GetSealedDirectoryContentCommand::NAME,
            Self::LogMessage(_) => LogMessageCommand::NAME,
            Self::Unrecognized => "unrecognized",
        }
    }
}

macro_rules! impl_into_command {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Command {
                fn from(command: $ty) -> Self {
                    Command::$variant(command)
                }
            }
        )*
    };
}

impl_into_command!(
    MaterializeFileCommand => MaterializeFile,
    RegisterBuildManifestHashesCommand => RegisterBuildManifestHashes,
    GenerateBuildManifestFileListCommand => GenerateBuildManifestFileList,
    ReportStatisticsCommand => ReportStatistics,
    GetSealedDirectoryContentCommand => GetSealedDirectoryContent,
    LogMessageCommand => LogMessage,
);

/// Place a file's content on local disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeFileCommand {
    /// Handle of the file, when the client knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileHandle>,
    pub full_path: PathBuf,
}

impl IpcCommand for MaterializeFileCommand {
    type Output = bool;
    const NAME: &'static str = "materialize_file";
    const TIMED: bool = true;
}

/// One file of a [`RegisterBuildManifestHashesCommand`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifestFileRequest {
    pub relative_path: String,
    pub source_hash: ContentHash,
    pub full_path: PathBuf,
}

/// Resolve and record manifest hashes for files of a drop.
///
/// The output lists the entries that could not be resolved; it is empty
/// when every file succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBuildManifestHashesCommand {
    pub drop_name: String,
    pub files: Vec<BuildManifestFileRequest>,
}

impl RegisterBuildManifestHashesCommand {
    /// Unresolved entries in request order.
    pub fn entries(&self) -> Vec<BuildManifestEntry> {
        self.files
            .iter()
            .map(|file| {
                BuildManifestEntry::new(
                    self.drop_name.clone(),
                    file.relative_path.clone(),
                    file.source_hash,
                    file.full_path.clone(),
                )
            })
            .collect()
    }
}

impl IpcCommand for RegisterBuildManifestHashesCommand {
    type Output = Vec<BuildManifestEntry>;
    const NAME: &'static str = "register_build_manifest_hashes";
    const TIMED: bool = true;
}

/// Produce the file list of a drop from previously registered hashes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateBuildManifestFileListCommand {
    pub drop_name: String,
}

impl IpcCommand for GenerateBuildManifestFileListCommand {
    type Output = BuildManifestFileList;
    const NAME: &'static str = "generate_build_manifest_file_list";
    const TIMED: bool = true;
}

/// Numeric statistics to merge into the server's statistics table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatisticsCommand {
    pub stats: BTreeMap<String, i64>,
}

impl IpcCommand for ReportStatisticsCommand {
    type Output = bool;
    const NAME: &'static str = "report_statistics";
}

/// List the members of a sealed directory with their declared content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSealedDirectoryContentCommand {
    pub directory: DirectoryHandle,
    pub full_path: PathBuf,
}

impl IpcCommand for GetSealedDirectoryContentCommand {
    type Output = Vec<SealedDirectoryFile>;
    const NAME: &'static str = "get_sealed_directory_content";
    const TIMED: bool = true;
}

/// A message for the server's log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessageCommand {
    pub message: String,
    #[serde(default)]
    pub is_warning: bool,
}

impl IpcCommand for LogMessageCommand {
    type Output = bool;
    const NAME: &'static str = "log_message";
}

/// Outcome category of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcStatus {
    Success,
    /// The payload did not decode to a known command shape.
    InvalidInput,
    /// The command decoded but failed while executing.
    ExecutionError,
}

/// Uniform response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpcResult {
    succeeded: bool,
    status: IpcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IpcResult {
    pub fn success(payload: serde_json::Value) -> Self {
        Self {
            succeeded: true,
            status: IpcStatus::Success,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn invalid_input(error: impl Into<String>) -> Self {
        Self::failure(IpcStatus::InvalidInput, error.into())
    }

    pub fn execution_error(error: impl Into<String>) -> Self {
        Self::failure(IpcStatus::ExecutionError, error.into())
    }

    fn failure(status: IpcStatus, error: String) -> Self {
        Self {
            succeeded: false,
            status,
            payload: None,
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn status(&self) -> IpcStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Decode the typed output of a successful result.
    ///
    /// A failed result is returned as `Err` carrying its error description.
    pub fn into_output<C: IpcCommand>(self) -> Result<C::Output, String> {
        if !self.succeeded {
            return Err(self.error.unwrap_or_else(|| "request failed".to_string()));
        }
        let payload = self.payload.unwrap_or(serde_json::Value::Null);
        C::parse_output(payload).map_err(|e| e.to_string())
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

/// Prefix `body` with a big-endian request id.
pub fn encode_frame(request_id: u64, body: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(REQUEST_ID_LEN + body.len());
    frame.put_u64(request_id);
    frame.put_slice(body);
    frame.freeze()
}

/// Split a frame into its request id and body.
pub fn decode_frame(frame: &[u8]) -> crate::Result<(u64, &[u8])> {
    if frame.len() < REQUEST_ID_LEN {
        return Err(crate::Error::InvalidFrame(format!(
            "frame of {} bytes is shorter than the {REQUEST_ID_LEN}-byte request id",
            frame.len()
        )));
    }
    let (id, body) = frame.split_at(REQUEST_ID_LEN);
    let mut id_bytes = [0u8; REQUEST_ID_LEN];
    id_bytes.copy_from_slice(id);
    Ok((u64::from_be_bytes(id_bytes), body))
}
