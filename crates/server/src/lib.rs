//! IPC server for external build tools.
//!
//! This crate provides:
//! - Command dispatch with per-command counters
//! - Manifest hash resolution over in-memory, persistent and local tiers
//! - File materialization with identity checks
//! - Sealed directory content queries
//! - Statistics aggregation and build manifest file lists
//! - A Unix socket shell

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod hash_cache;
pub mod ipc;
pub mod manifest_generator;
pub mod materialize;
pub mod metrics;
pub mod resolver;
pub mod sealed_directory;
pub mod state;
pub mod statistics;

pub use dispatch::Dispatcher;
pub use error::{ExecutionError, ResolveError};
pub use ipc::IpcServer;
pub use resolver::ManifestHashResolver;
pub use state::ServerState;
