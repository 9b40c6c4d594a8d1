//! File materialization with identity checks.

use crate::error::{ExecutionError, ExecutionResult};
use conduit_core::FileHandle;
use conduit_storage::FileAccess;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Front door to the file access collaborator for materialization.
///
/// Failures for a known handle are logged here, where they are the root
/// cause. Path-only failures are left to the caller, since the path may
/// legitimately be untracked.
pub struct MaterializationCoordinator {
    file_access: Arc<dyn FileAccess>,
}

impl MaterializationCoordinator {
    pub fn new(file_access: Arc<dyn FileAccess>) -> Self {
        Self { file_access }
    }

    /// Materialize a file declared by an optional handle and a full path.
    ///
    /// A valid handle must name exactly `full_path`; otherwise nothing is
    /// materialized and an identity mismatch is returned.
    pub async fn materialize(
        &self,
        file: Option<&FileHandle>,
        full_path: &Path,
    ) -> ExecutionResult<bool> {
        match file.filter(|handle| handle.is_valid()) {
            Some(handle) => {
                if !handle.matches_path(full_path) {
                    error!(
                        handle = %handle.path.display(),
                        declared = %full_path.display(),
                        "file handle does not match declared path"
                    );
                    return Err(ExecutionError::IdentityMismatch {
                        handle: handle.path.clone(),
                        declared: full_path.to_path_buf(),
                    });
                }
                self.materialize_known(handle).await
            }
            None => self.materialize_by_path(full_path).await,
        }
    }

    /// Materialize a file by the best identity the orchestrator has for it.
    pub async fn materialize_best_effort(&self, path: &Path) -> ExecutionResult<bool> {
        match self.file_access.resolve_file(path).await? {
            Some(handle) => self.materialize_known(&handle).await,
            None => self.materialize_by_path(path).await,
        }
    }

    async fn materialize_known(&self, handle: &FileHandle) -> ExecutionResult<bool> {
        match self.file_access.materialize_file(handle).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                error!(
                    path = %handle.path.display(),
                    rewrite_count = handle.rewrite_count,
                    backend = self.file_access.backend_name(),
                    "failed to materialize file"
                );
                Ok(false)
            }
            Err(e) => {
                error!(
                    path = %handle.path.display(),
                    rewrite_count = handle.rewrite_count,
                    backend = self.file_access.backend_name(),
                    error = %e,
                    "failed to materialize file"
                );
                Err(e.into())
            }
        }
    }

    async fn materialize_by_path(&self, path: &Path) -> ExecutionResult<bool> {
        Ok(self.file_access.materialize_by_path(path).await?)
    }
}
