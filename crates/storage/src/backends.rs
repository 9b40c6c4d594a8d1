//! Concrete collaborator backends.

pub mod filesystem;
pub mod local;
pub mod memory;
