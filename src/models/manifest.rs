use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

/// File that finalizes a snapshot as valid. Always written last; a snapshot
/// directory without it is inert garbage for every downstream stage.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Per-page metadata recorded as the page is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    /// File name within the snapshot directory, e.g. `page001.json`.
    pub file: String,
    /// Final on-disk location after the snapshot directory is renamed into
    /// place.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
    /// 1-based page index.
    pub page: u32,
    /// Number of entries in the page's `results` array, or None when the
    /// body was not parseable JSON (raw content is opaque by contract).
    pub results_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub snapshot_id: String,
    pub created_utc: DateTime<Utc>,
    pub country: String,
    pub query: String,
    #[serde(default)]
    pub location_filter: Option<String>,
    pub results_per_page: u32,
    pub pages_requested: u32,
    pub pages_fetched: u32,
    pub pages: Vec<PageMeta>,
    /// Request parameters with credential-bearing fields redacted.
    pub params_template: BTreeMap<String, String>,
    #[serde(default)]
    pub notes: String,
}

impl SnapshotManifest {
    /// Load the manifest of a snapshot directory.
    ///
    /// A missing or malformed manifest is an `Integrity` error: the snapshot
    /// must be treated as incomplete and ignored.
    pub fn load(snapshot_dir: &Path) -> Result<Self, IngestError> {
        let path = snapshot_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            IngestError::Integrity(format!(
                "snapshot {} has no readable manifest: {}",
                snapshot_dir.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            IngestError::Integrity(format!(
                "snapshot {} has a malformed manifest: {}",
                snapshot_dir.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_manifest() -> SnapshotManifest {
        SnapshotManifest {
            snapshot_id: "jobsnap__gb__q_data__20260805T120000Z".to_string(),
            created_utc: Utc::now(),
            country: "gb".to_string(),
            query: "data".to_string(),
            location_filter: None,
            results_per_page: 50,
            pages_requested: 2,
            pages_fetched: 2,
            pages: vec![PageMeta {
                file: "page001.json".to_string(),
                path: "data/raw/jobsnap__gb__q_data__20260805T120000Z/page001.json".to_string(),
                sha256: "ab".repeat(32),
                bytes: 1234,
                page: 1,
                results_count: Some(50),
            }],
            params_template: BTreeMap::from([
                ("app_id".to_string(), "***".to_string()),
                ("what".to_string(), "data".to_string()),
            ]),
            notes: String::new(),
        }
    }

    #[test]
    fn test_manifest_serde_round_trip() {
        let manifest = sample_manifest();
        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let back: SnapshotManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.snapshot_id, manifest.snapshot_id);
        assert_eq!(back.pages_fetched, 2);
        assert_eq!(back.pages.len(), 1);
        assert_eq!(back.pages[0].results_count, Some(50));
        assert_eq!(back.params_template.get("app_id").map(String::as_str), Some("***"));
    }

    #[test]
    fn test_load_missing_manifest_is_integrity_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let err = SnapshotManifest::load(tmp.path()).unwrap_err();
        match err {
            IngestError::Integrity(msg) => assert!(msg.contains("no readable manifest")),
            other => panic!("Expected Integrity, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_malformed_manifest_is_integrity_error() {
        let tmp = TempDir::new().expect("create temp dir");
        std::fs::write(tmp.path().join(MANIFEST_FILE), b"{ not json").expect("write");
        let err = SnapshotManifest::load(tmp.path()).unwrap_err();
        match err {
            IngestError::Integrity(msg) => assert!(msg.contains("malformed manifest")),
            other => panic!("Expected Integrity, got: {:?}", other),
        }
    }
}
