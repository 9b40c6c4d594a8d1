//! Command executors.
//!
//! One async function per command, each taking the shared state and the
//! command payload and returning the command's typed output.

pub mod files;
pub mod manifest;
pub mod reporting;

pub use files::*;
pub use manifest::*;
pub use reporting::*;
