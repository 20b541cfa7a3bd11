//! Processing commands: flatten (prune + flatten) and merge.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::flatten::{self, DateFilter};
use crate::merge;
use crate::models::DataLayout;
use crate::snapshot::prune;

pub async fn cmd_flatten(
    layout: &DataLayout,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> Result<()> {
    let raw_dir = layout.raw_dir();
    let interim_dir = layout.interim_dir();
    let locks_dir = layout.locks_dir();
    let filter = DateFilter { since, until };

    // Pruning and flattening are filesystem-bound batch work; run the whole
    // stage off the async runtime.
    let summary = tokio::task::spawn_blocking(move || -> Result<(usize, usize, usize)> {
        let retained = prune::prune(&raw_dir, &locks_dir).context("pruning snapshots")?;

        let mut written = 0usize;
        let mut skipped = 0usize;
        let mut total_rows = 0usize;
        for (key, snapshot_path) in &retained {
            let records = match flatten::flatten(key, snapshot_path, &filter, &locks_dir) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        "partition {}: flatten stage skipped snapshot {}: {}",
                        key,
                        snapshot_path.display(),
                        e
                    );
                    skipped += 1;
                    continue;
                }
            };
            if records.is_empty() {
                tracing::info!("partition {}: no records to flatten", key);
                skipped += 1;
                continue;
            }

            let rows = records.len();
            let table = flatten::records_to_table(records);
            let out_path = interim_dir.join(key.table_file_name());
            table
                .write_csv(&out_path)
                .with_context(|| format!("partition {}: writing {}", key, out_path.display()))?;
            tracing::info!(
                "partition {}: wrote {} rows to {}",
                key,
                rows,
                out_path.display()
            );
            written += 1;
            total_rows += rows;
        }
        Ok((written, skipped, total_rows))
    })
    .await
    .context("flatten stage task failed")??;

    let (written, skipped, total_rows) = summary;
    println!(
        "Flatten complete: {} partition tables written ({} rows), {} partitions skipped",
        written, total_rows, skipped
    );
    Ok(())
}

pub async fn cmd_merge(layout: &DataLayout) -> Result<()> {
    let interim_dir = layout.interim_dir();

    let merged = tokio::task::spawn_blocking(move || -> Result<Option<(usize, usize)>> {
        let tables = merge::load_partition_tables(&interim_dir).context("loading partition tables")?;
        if tables.is_empty() {
            return Ok(None);
        }
        let count = tables.len();
        let master = merge::merge_tables(&tables).context("merging partition tables")?;
        let out_path = interim_dir.join(merge::MASTER_FILE);
        master
            .write_csv(&out_path)
            .with_context(|| format!("writing {}", out_path.display()))?;
        Ok(Some((count, master.len())))
    })
    .await
    .context("merge stage task failed")??;

    match merged {
        Some((tables, rows)) => {
            println!(
                "Merged {} partition tables ({} rows) into {}",
                tables,
                rows,
                merge::MASTER_FILE
            );
        }
        None => println!("No partition tables found to merge."),
    }
    Ok(())
}
