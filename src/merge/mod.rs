//! Merging: concatenates all per-partition tables into the master table,
//! injecting the provenance column.

use std::path::Path;

use crate::errors::IngestError;
use crate::models::PartitionKey;
use crate::table::Table;

/// File name of the master table inside the interim directory.
pub const MASTER_FILE: &str = "all_jobs_merged.csv";

/// Leading provenance column injected into every merged row, valued from the
/// source partition key, never read from record content.
pub const PROVENANCE_COLUMN: &str = "country_code";

/// Concatenate partition tables into the master table.
///
/// Inputs must already be in the desired (deterministic) order. The first
/// table's columns define the master schema; any divergence is a
/// `SchemaMismatch` naming the offending partition; schema drift is
/// surfaced, never silently reconciled.
pub fn merge_tables(inputs: &[(PartitionKey, Table)]) -> Result<Table, IngestError> {
    let first = inputs.first().ok_or_else(|| {
        IngestError::Validation("no partition tables to merge".to_string())
    })?;
    let schema = &first.1.columns;

    let mut columns = Vec::with_capacity(schema.len() + 1);
    columns.push(PROVENANCE_COLUMN.to_string());
    columns.extend(schema.iter().cloned());
    let mut master = Table::new(columns);

    for (key, table) in inputs {
        if &table.columns != schema {
            return Err(IngestError::SchemaMismatch {
                partition: key.to_string(),
                expected: schema.join(","),
                actual: table.columns.join(","),
            });
        }
        for row in &table.rows {
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(key.country.clone());
            out.extend(row.iter().cloned());
            master.push_row(out);
        }
        tracing::info!("partition {}: merged {} rows", key, table.len());
    }

    Ok(master)
}

/// Load every partition table in `interim_dir` in lexicographic file order.
///
/// Files that do not follow the partition naming convention are skipped with
/// a warning (the master file is excluded by construction). An unreadable
/// table fails the merge: a missing partition would silently shrink the
/// master.
pub fn load_partition_tables(
    interim_dir: &Path,
) -> Result<Vec<(PartitionKey, Table)>, IngestError> {
    let mut names: Vec<String> = Vec::new();
    let entries = match std::fs::read_dir(interim_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();

    let mut tables = Vec::new();
    for name in names {
        if name == MASTER_FILE || !name.ends_with(".csv") {
            continue;
        }
        let key = match PartitionKey::parse_table_file_name(&name) {
            Some(key) => key,
            None => {
                tracing::warn!("skipping non-partition file {} in interim dir", name);
                continue;
            }
        };
        let table = Table::read_csv(&interim_dir.join(&name))?;
        tables.push((key, table));
    }
    Ok(tables)
}
