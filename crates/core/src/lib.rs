//! Core domain types shared by the Conduit server and its clients.
//!
//! This crate defines the data model used across all other crates:
//! - Tagged content hashes and incremental hashers
//! - File and directory handles issued by the orchestrator
//! - Build manifest entries and generated file lists
//! - The command protocol and its result envelope
//! - Configuration

pub mod artifact;
pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod protocol;

pub use artifact::{DirectoryHandle, FileContentInfo, FileHandle, SealedDirectoryFile};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, HASH_LENGTH, HashType};
pub use manifest::{BuildManifestEntry, BuildManifestFile, BuildManifestFileList};
pub use protocol::{Command, IpcCommand, IpcResult, IpcStatus};

/// Read buffer size used when hashing files (64 KiB).
pub const HASH_READ_CHUNK_SIZE: usize = 64 * 1024;
