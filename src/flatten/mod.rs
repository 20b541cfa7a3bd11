//! Flattening: projects retained raw snapshots into fixed-schema
//! per-partition rows.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::errors::IngestError;
use crate::models::{JobRecord, PartitionKey, SnapshotManifest, TABLE_COLUMNS};
use crate::snapshot::PartitionLock;
use crate::table::Table;

/// Inclusive creation-date filter: `[since 00:00:00 UTC, until 23:59:59 UTC]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFilter {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl DateFilter {
    pub fn is_active(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }

    /// Whether a record with this raw `created` value passes the filter.
    ///
    /// With no filter active, everything passes, including values that do
    /// not parse. With a filter active, an unparsable value is excluded.
    pub fn admits(&self, created_raw: &str) -> bool {
        if !self.is_active() {
            return true;
        }
        let created = match DateTime::parse_from_rfc3339(created_raw) {
            Ok(ts) => ts.with_timezone(&Utc).date_naive(),
            Err(_) => return false,
        };
        if let Some(since) = self.since {
            if created < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if created > until {
                return false;
            }
        }
        true
    }
}

/// Read one retained snapshot and project its pages into JobRecords.
///
/// Holds the partition's advisory lock for the duration of the read. Page
/// files are visited in ascending page-index order per the manifest; a page
/// that is missing, unreadable, or not valid JSON is skipped with a warning
/// and flattening proceeds with the rest. Row order is deterministic for the
/// same pages actually read.
pub fn flatten(
    key: &PartitionKey,
    snapshot_path: &Path,
    filter: &DateFilter,
    locks_dir: &Path,
) -> Result<Vec<JobRecord>, IngestError> {
    let _lock = PartitionLock::acquire(locks_dir, key)?;

    let manifest = SnapshotManifest::load(snapshot_path)?;
    let mut pages = manifest.pages;
    pages.sort_by_key(|p| p.page);

    let mut records = Vec::new();
    let mut excluded = 0usize;

    for page in &pages {
        let path = snapshot_path.join(&page.file);
        let body = match std::fs::read(&path) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    "partition {}: skipping page {} ({}): {}",
                    key,
                    page.page,
                    path.display(),
                    e
                );
                continue;
            }
        };
        let value: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "partition {}: skipping page {} with malformed JSON: {}",
                    key,
                    page.page,
                    e
                );
                continue;
            }
        };

        let results = match value.get("results").and_then(Value::as_array) {
            Some(results) => results,
            None => {
                tracing::warn!(
                    "partition {}: page {} has no results array, skipping",
                    key,
                    page.page
                );
                continue;
            }
        };

        for result in results {
            let record = JobRecord::from_result(result, &key.query_slug);
            if filter.admits(&record.created) {
                records.push(record);
            } else {
                excluded += 1;
            }
        }
    }

    if excluded > 0 {
        tracing::info!(
            "partition {}: date filter excluded {} records",
            key,
            excluded
        );
    }

    Ok(records)
}

/// Assemble flattened records into the fixed-column partition table.
pub fn records_to_table(records: Vec<JobRecord>) -> Table {
    let mut table = Table::new(TABLE_COLUMNS.iter().map(|c| c.to_string()).collect());
    for record in records {
        table.push_row(record.into_row());
    }
    table
}
