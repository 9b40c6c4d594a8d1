//! Server error types.
//!
//! Everything here is recovered at the dispatcher boundary and rendered into
//! an [`IpcResult`](conduit_core::IpcResult); none of it crosses into the
//! transport.

use conduit_core::ContentHash;
use std::path::PathBuf;

/// Failure of a command executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(
        "file identity mismatch: handle path '{}' does not match declared path '{}'",
        handle.display(),
        declared.display()
    )]
    IdentityMismatch { handle: PathBuf, declared: PathBuf },

    #[error("failed to materialize file '{}'", path.display())]
    MaterializationFailed { path: PathBuf },

    #[error(
        "Failed to query content for {failed} out of {total} files in sealed directory '{}': {files}",
        directory.display()
    )]
    InconsistentSealContent {
        directory: PathBuf,
        failed: usize,
        total: usize,
        files: String,
    },

    /// Generator error surfaced verbatim.
    #[error("{0}")]
    ManifestGeneration(String),

    #[error("storage error: {0}")]
    Storage(#[from] conduit_storage::StorageError),
}

/// Failure to resolve the manifest hash of one entry.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("source hash {0} cannot be resolved")]
    InvalidSourceHash(ContentHash),

    #[error("failed to materialize '{}' before hashing", path.display())]
    MaterializationFailed { path: PathBuf },

    #[error("file '{}' not found after {attempts} attempts", path.display())]
    FileNotFound { path: PathBuf, attempts: u32 },

    #[error("failed to hash '{}' after {attempts} attempts: {source}", path.display())]
    HashingFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "content of '{}' does not match the build: expected {expected}, found {actual}",
        path.display()
    )]
    ContentMismatch {
        path: PathBuf,
        expected: ContentHash,
        actual: ContentHash,
    },
}

pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::HashType;

    #[test]
    fn test_seal_error_message() {
        let err = ExecutionError::InconsistentSealContent {
            directory: PathBuf::from("/out/seal"),
            failed: 1,
            total: 3,
            files: "b.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to query content for 1 out of 3 files in sealed directory '/out/seal': b.txt"
        );
    }

    #[test]
    fn test_mismatch_names_both_hashes() {
        let expected = ContentHash::compute(HashType::Blake3, b"build");
        let actual = ContentHash::compute(HashType::Blake3, b"disk");
        let err = ResolveError::ContentMismatch {
            path: PathBuf::from("/src/a"),
            expected,
            actual,
        };
        let message = err.to_string();
        assert!(message.contains(&expected.to_string()));
        assert!(message.contains(&actual.to_string()));
    }

    #[test]
    fn test_not_found_names_path_and_attempts() {
        let err = ResolveError::FileNotFound {
            path: PathBuf::from("/src/missing"),
            attempts: 6,
        };
        assert_eq!(err.to_string(), "file '/src/missing' not found after 6 attempts");
    }

    #[test]
    fn test_generation_error_is_verbatim() {
        let err = ExecutionError::ManifestGeneration("no files recorded for drop 'x'".into());
        assert_eq!(err.to_string(), "no files recorded for drop 'x'");
    }
}
