use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::IngestError;
use crate::models::{PartitionKey, SnapshotName, MANIFEST_FILE, SNAPSHOT_PREFIX};
use crate::snapshot::PartitionLock;

/// Retain the newest valid snapshot per partition and delete the rest.
///
/// Scans the immediate subdirectories of `raw_dir`. Staging leftovers
/// (`*.tmp`) and manifest-less directories are swept with a warning; names
/// matching the snapshot prefix that fail to parse are warned and skipped.
/// Within a group the timestamp format makes string order chronological, so
/// the lexicographically greatest name wins. Deletion failures are isolated
/// per group. Invoking prune twice with no new snapshots returns the same
/// mapping and deletes nothing more.
pub fn prune(
    raw_dir: &Path,
    locks_dir: &Path,
) -> Result<BTreeMap<PartitionKey, PathBuf>, IngestError> {
    let mut groups: BTreeMap<PartitionKey, Vec<(String, PathBuf)>> = BTreeMap::new();

    let entries = match std::fs::read_dir(raw_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("raw dir {} does not exist, nothing to prune", raw_dir.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if !name.starts_with(SNAPSHOT_PREFIX) {
            continue;
        }

        if name.ends_with(".tmp") {
            tracing::warn!("sweeping abandoned staging dir {}", name);
            if let Err(e) = std::fs::remove_dir_all(entry.path()) {
                tracing::warn!("failed to sweep {}: {}", name, e);
            }
            continue;
        }

        let parsed = match SnapshotName::parse(&name) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("skipping unrecognized snapshot dir: {}", e);
                continue;
            }
        };

        // A snapshot is only valid through its manifest. A well-named dir
        // without one is crash garbage and must never win retention.
        if !entry.path().join(MANIFEST_FILE).exists() {
            tracing::warn!("sweeping manifest-less snapshot dir {}", name);
            if let Err(e) = std::fs::remove_dir_all(entry.path()) {
                tracing::warn!("failed to sweep {}: {}", name, e);
            }
            continue;
        }

        groups
            .entry(parsed.key)
            .or_default()
            .push((parsed.timestamp, entry.path()));
    }

    let mut retained = BTreeMap::new();
    let mut deleted = 0usize;

    for (key, mut snapshots) in groups {
        snapshots.sort_by(|a, b| b.0.cmp(&a.0));
        let (_, newest) = snapshots.remove(0);
        retained.insert(key.clone(), newest);

        if snapshots.is_empty() {
            continue;
        }

        let _lock = match PartitionLock::acquire(locks_dir, &key) {
            Ok(lock) => lock,
            Err(e) => {
                tracing::warn!("partition {}: could not take lock, skipping prune: {}", key, e);
                continue;
            }
        };

        for (_, old) in snapshots {
            tracing::info!("partition {}: deleting superseded snapshot {}", key, old.display());
            if let Err(e) = std::fs::remove_dir_all(&old) {
                tracing::warn!(
                    "partition {}: failed to delete {}, skipping rest of group: {}",
                    key,
                    old.display(),
                    e
                );
                break;
            }
            deleted += 1;
        }
    }

    tracing::info!(
        "prune complete: {} partitions retained, {} snapshots deleted",
        retained.len(),
        deleted
    );
    Ok(retained)
}
