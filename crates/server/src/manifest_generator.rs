//! Build manifest file-list generation from registered entries.

use conduit_core::{BuildManifestEntry, BuildManifestFile, BuildManifestFileList, ContentHash};
use conduit_storage::BuildManifestGenerator;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Records resolved entries per drop and renders them as sorted file lists.
#[derive(Default)]
pub struct InMemoryManifestGenerator {
    drops: DashMap<String, BTreeMap<String, RecordedFile>>,
}

/// First hash recorded for a path, plus any different hashes seen later.
#[derive(Clone, Debug)]
struct RecordedFile {
    hash: ContentHash,
    conflicts: Vec<ContentHash>,
}

impl RecordedFile {
    fn record(&mut self, hash: ContentHash) {
        if hash != self.hash && !self.conflicts.contains(&hash) {
            self.conflicts.push(hash);
        }
    }
}

impl InMemoryManifestGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildManifestGenerator for InMemoryManifestGenerator {
    fn record_files(&self, entries: &[BuildManifestEntry]) {
        for entry in entries.iter().filter(|e| e.is_valid()) {
            self.drops
                .entry(entry.drop_name.clone())
                .or_default()
                .entry(entry.relative_path.clone())
                .and_modify(|recorded| recorded.record(entry.build_manifest_hash))
                .or_insert_with(|| RecordedFile {
                    hash: entry.build_manifest_hash,
                    conflicts: Vec::new(),
                });
        }
    }

    fn generate_file_list(&self, drop_name: &str) -> Result<BuildManifestFileList, String> {
        // Clone out of the map so no shard lock is held while building the list.
        let files = match self.drops.get(drop_name) {
            Some(files) if !files.is_empty() => files.clone(),
            _ => return Err(format!("no files recorded for drop '{drop_name}'")),
        };

        let conflicts: Vec<String> = files
            .iter()
            .flat_map(|(path, recorded)| {
                recorded
                    .conflicts
                    .iter()
                    .map(move |other| format!("'{path}' ({} vs {other})", recorded.hash))
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(format!(
                "conflicting manifest hashes in drop '{drop_name}': {}",
                conflicts.join(", ")
            ));
        }

        Ok(BuildManifestFileList {
            drop_name: drop_name.to_string(),
            files: files
                .into_iter()
                .map(|(relative_path, recorded)| BuildManifestFile {
                    relative_path,
                    hash: recorded.hash,
                })
                .collect(),
        })
    }
}
