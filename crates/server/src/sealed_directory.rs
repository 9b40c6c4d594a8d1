//! Content listing of sealed directories.

use crate::error::{ExecutionError, ExecutionResult};
use conduit_core::{DirectoryHandle, FileHandle, SealedDirectoryFile};
use conduit_storage::FileAccess;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// List every member of a sealed directory with its declared content.
///
/// All members are queried concurrently. A member with no content that is not
/// declared absent fails the whole query; the error names every such member
/// relative to the directory.
pub async fn sealed_directory_content(
    file_access: &Arc<dyn FileAccess>,
    directory: &DirectoryHandle,
    full_path: &Path,
) -> ExecutionResult<Vec<SealedDirectoryFile>> {
    if !directory.matches_path(full_path) {
        error!(
            handle = %directory.path.display(),
            declared = %full_path.display(),
            "directory handle does not match declared path"
        );
        return Err(ExecutionError::IdentityMismatch {
            handle: directory.path.clone(),
            declared: full_path.to_path_buf(),
        });
    }

    let members = file_access.list_sealed_directory(directory).await?;
    let queries = members
        .iter()
        .map(|file| file_access.try_get_file_content(file, true));
    let contents = futures::future::join_all(queries).await;

    let total = members.len();
    let mut files = Vec::with_capacity(total);
    let mut missing: Vec<&FileHandle> = Vec::new();
    for (file, content) in members.iter().zip(contents) {
        match content {
            Ok(Some(info)) if !info.hash.is_unknown() => files.push(SealedDirectoryFile {
                path: file.path.clone(),
                file: file.clone(),
                content_info: info,
            }),
            Ok(_) => missing.push(file),
            Err(e) => {
                error!(path = %file.path.display(), error = %e, "failed to query file content");
                missing.push(file);
            }
        }
    }

    if !missing.is_empty() {
        let names: Vec<String> = missing
            .iter()
            .map(|file| {
                file.path
                    .strip_prefix(&directory.path)
                    .unwrap_or(&file.path)
                    .display()
                    .to_string()
            })
            .collect();
        let err = ExecutionError::InconsistentSealContent {
            directory: directory.path.clone(),
            failed: missing.len(),
            total,
            files: names.join(", "),
        };
        error!(error = %err, "sealed directory content is inconsistent");
        return Err(err);
    }

    Ok(files)
}
