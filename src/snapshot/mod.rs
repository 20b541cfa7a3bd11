//! Snapshot lifecycle: capture (writer), keep-latest pruning, and the
//! per-partition advisory lock shared by the pruner and the flattener.

pub mod prune;
pub mod writer;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::errors::IngestError;
use crate::models::PartitionKey;

/// Exclusive advisory lock for one partition key, backed by a lock file.
///
/// Held by the pruner while deleting a partition's superseded snapshots and
/// by the flattener while reading the retained one, so concurrent stages
/// never race on the same key. Released on drop.
pub struct PartitionLock {
    file: File,
    path: PathBuf,
}

impl PartitionLock {
    /// Block until the lock for `key` is held.
    pub fn acquire(locks_dir: &Path, key: &PartitionKey) -> Result<Self, IngestError> {
        std::fs::create_dir_all(locks_dir)?;
        let path = locks_dir.join(format!("{}__{}.lock", key.country, key.query_slug));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
