use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::errors::IngestError;
use crate::fetch::cancel::CancelToken;
use crate::fetch::{PageSource, SearchParams};
use crate::models::{PageMeta, PartitionKey, SnapshotManifest, SnapshotName, MANIFEST_FILE};

const SNAPSHOT_NOTES: &str = "RAW snapshot saved per page. Do not edit files under raw/. \
     Downstream stages read from this snapshot and derive interim tables.";

/// Summary of one completed capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub snapshot_id: String,
    pub path: PathBuf,
    pub pages_fetched: u32,
    pub total_results: u64,
}

/// Persists fetched pages for one partition as an immutable snapshot.
///
/// Pages are written verbatim into a `.tmp` staging directory; the manifest
/// is written strictly last, and the directory is then atomically renamed
/// into place. A crash at any point leaves either nothing visible or a
/// `.tmp` directory the pruner sweeps later, never a manifest-less
/// snapshot under a valid name.
pub struct SnapshotWriter {
    raw_dir: PathBuf,
    throttle: Duration,
}

impl SnapshotWriter {
    pub fn new(raw_dir: impl Into<PathBuf>, throttle_secs: f64) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            throttle: Duration::from_secs_f64(throttle_secs.max(0.0)),
        }
    }

    /// Fetch `pages_requested` pages sequentially and persist them as one
    /// snapshot. Fails atomically: any fetch or write error (or
    /// cancellation) removes the staging directory and no snapshot appears.
    pub async fn capture(
        &self,
        source: &dyn PageSource,
        key: &PartitionKey,
        params: &SearchParams,
        pages_requested: u32,
        cancel: &CancelToken,
    ) -> Result<CaptureOutcome, IngestError> {
        let name = SnapshotName::new(key.clone(), Utc::now());
        let snapshot_id = name.dir_name();
        let final_dir = self.raw_dir.join(&snapshot_id);
        let staging_dir = self.raw_dir.join(format!("{}.tmp", snapshot_id));

        tokio::fs::create_dir_all(&staging_dir).await?;

        match self
            .capture_into(source, key, params, pages_requested, cancel, &snapshot_id, &staging_dir, &final_dir)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&staging_dir).await {
                    tracing::warn!(
                        "partition {}: failed to clean staging dir {}: {}",
                        key,
                        staging_dir.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture_into(
        &self,
        source: &dyn PageSource,
        key: &PartitionKey,
        params: &SearchParams,
        pages_requested: u32,
        cancel: &CancelToken,
        snapshot_id: &str,
        staging_dir: &Path,
        final_dir: &Path,
    ) -> Result<CaptureOutcome, IngestError> {
        let mut pages = Vec::with_capacity(pages_requested as usize);
        let mut pages_fetched = 0u32;
        let mut total_results = 0u64;

        for page in 1..=pages_requested {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            let raw = source.fetch_page(&key.country, page, params, cancel).await?;

            let file = format!("page{:03}.json", page);
            let page_path = staging_dir.join(&file);
            tokio::fs::write(&page_path, &raw.body).await?;

            let sha256 = hex::encode(Sha256::digest(&raw.body));
            pages.push(PageMeta {
                file: file.clone(),
                path: final_dir.join(&file).display().to_string(),
                sha256,
                bytes: raw.body.len() as u64,
                page,
                results_count: raw.results_count,
            });
            pages_fetched += 1;
            total_results += raw.results_count.unwrap_or(0);
            tracing::debug!(
                "partition {}: page {}/{} saved ({} bytes)",
                key,
                page,
                pages_requested,
                raw.body.len()
            );

            // Throttle between consecutive successful fetches, not after the
            // last page. Retry backoff is handled inside the page source.
            if page < pages_requested {
                tokio::time::sleep(self.throttle).await;
            }
        }

        let manifest = SnapshotManifest {
            snapshot_id: snapshot_id.to_string(),
            created_utc: Utc::now(),
            country: key.country.clone(),
            query: params.query.clone(),
            location_filter: params.location.clone(),
            results_per_page: params.results_per_page,
            pages_requested,
            pages_fetched,
            pages,
            params_template: params.redacted_template(),
            notes: SNAPSHOT_NOTES.to_string(),
        };

        // The manifest finalizes the snapshot; it must be the last file
        // written before the directory becomes visible.
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(staging_dir.join(MANIFEST_FILE), manifest_json.as_bytes()).await?;

        tokio::fs::rename(staging_dir, final_dir).await?;

        tracing::info!(
            "partition {}: snapshot {} created ({} pages, {} results)",
            key,
            snapshot_id,
            pages_fetched,
            total_results
        );

        Ok(CaptureOutcome {
            snapshot_id: snapshot_id.to_string(),
            path: final_dir.to_path_buf(),
            pages_fetched,
            total_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RawPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Serves canned page bodies; fails a chosen page with a chosen error.
    struct FakeSource {
        bodies: Vec<&'static str>,
        fail_page: Option<u32>,
        calls: AtomicU32,
    }

    impl FakeSource {
        fn new(bodies: Vec<&'static str>) -> Self {
            Self {
                bodies,
                fail_page: None,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_at(mut self, page: u32) -> Self {
            self.fail_page = Some(page);
            self
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(
            &self,
            _country: &str,
            page: u32,
            _params: &SearchParams,
            _cancel: &CancelToken,
        ) -> Result<RawPage, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_page == Some(page) {
                return Err(IngestError::Client {
                    status: 400,
                    body: "bad request".to_string(),
                });
            }
            let body = self.bodies[(page - 1) as usize].as_bytes().to_vec();
            let results_count = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("results").and_then(|r| r.as_array()).map(|a| a.len() as u64));
            Ok(RawPage {
                page,
                body,
                results_count,
            })
        }
    }

    fn params() -> SearchParams {
        SearchParams {
            query: "data".to_string(),
            location: None,
            results_per_page: 50,
            sort_by: "date".to_string(),
        }
    }

    #[tokio::test]
    async fn test_capture_writes_pages_and_manifest_last() {
        let tmp = TempDir::new().expect("create temp dir");
        let writer = SnapshotWriter::new(tmp.path(), 0.0);
        let source = FakeSource::new(vec![
            r#"{"results": [1, 2]}"#,
            r#"{"results": [3, 4, 5]}"#,
        ]);
        let key = PartitionKey::new("gb", "data");

        let outcome = writer
            .capture(&source, &key, &params(), 2, &CancelToken::new())
            .await
            .expect("capture");

        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.total_results, 5);
        assert!(outcome.path.exists());
        assert!(outcome.path.join("page001.json").exists());
        assert!(outcome.path.join("page002.json").exists());

        // Verbatim bytes.
        let body = std::fs::read(outcome.path.join("page001.json")).expect("read page");
        assert_eq!(body, br#"{"results": [1, 2]}"#);

        let manifest = SnapshotManifest::load(&outcome.path).expect("load manifest");
        assert_eq!(manifest.snapshot_id, outcome.snapshot_id);
        assert_eq!(manifest.pages_requested, 2);
        assert_eq!(manifest.pages_fetched, 2);
        assert_eq!(manifest.pages.len(), 2);
        assert_eq!(manifest.pages[0].results_count, Some(2));
        assert_eq!(manifest.pages[1].results_count, Some(3));
        assert_eq!(
            manifest.params_template.get("app_id").map(String::as_str),
            Some("***")
        );

        // Recorded hash matches file content.
        let expected = hex::encode(Sha256::digest(&body));
        assert_eq!(manifest.pages[0].sha256, expected);

        // No staging directory survives.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_capture_leaves_nothing_behind() {
        let tmp = TempDir::new().expect("create temp dir");
        let writer = SnapshotWriter::new(tmp.path(), 0.0);
        let source = FakeSource::new(vec![r#"{"results": [1]}"#, ""]).failing_at(2);
        let key = PartitionKey::new("gb", "data");

        let err = writer
            .capture(&source, &key, &params(), 2, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Client { status: 400, .. }));

        // Fetch stopped at the failing page, and the raw dir is empty: no
        // partially-written snapshot is ever visible.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .collect();
        assert!(entries.is_empty(), "expected empty raw dir: {:?}", entries);
    }

    #[tokio::test]
    async fn test_cancelled_capture_aborts_between_pages() {
        let tmp = TempDir::new().expect("create temp dir");
        let writer = SnapshotWriter::new(tmp.path(), 0.0);
        let source = FakeSource::new(vec![r#"{"results": []}"#, ""]);
        let key = PartitionKey::new("gb", "data");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = writer
            .capture(&source, &key, &params(), 2, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Cancelled));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_opaque_non_json_body_is_persisted() {
        let tmp = TempDir::new().expect("create temp dir");
        let writer = SnapshotWriter::new(tmp.path(), 0.0);
        let source = FakeSource::new(vec!["definitely not json"]);
        let key = PartitionKey::new("gb", "data");

        let outcome = writer
            .capture(&source, &key, &params(), 1, &CancelToken::new())
            .await
            .expect("capture");
        assert_eq!(outcome.total_results, 0);

        let manifest = SnapshotManifest::load(&outcome.path).expect("load manifest");
        assert_eq!(manifest.pages[0].results_count, None);
        let body = std::fs::read(outcome.path.join("page001.json")).expect("read page");
        assert_eq!(body, b"definitely not json");
    }
}
