use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::IngestError;

/// Leading segment of every snapshot directory name.
pub const SNAPSHOT_PREFIX: &str = "jobsnap";

/// Compact UTC timestamp used in snapshot names, e.g. `20260805T120000Z`.
/// Lexicographic order equals chronological order, so string comparison is
/// enough to find the newest snapshot.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const TABLE_FILE_SUFFIX: &str = "_jobs.csv";

/// One (country, query) ingestion target: the unit of snapshot, flatten,
/// and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub country: String,
    pub query_slug: String,
}

impl PartitionKey {
    /// Build a key from a raw country code and free-text query.
    pub fn new(country: &str, query: &str) -> Self {
        Self {
            country: country.trim().to_lowercase(),
            query_slug: safe_slug(query),
        }
    }

    /// File name of this partition's interim table, e.g.
    /// `gb__data_engineer_jobs.csv`.
    pub fn table_file_name(&self) -> String {
        format!("{}__{}{}", self.country, self.query_slug, TABLE_FILE_SUFFIX)
    }

    /// Recover a key from an interim table file name.
    pub fn parse_table_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(TABLE_FILE_SUFFIX)?;
        let (country, slug) = stem.split_once("__")?;
        if country.is_empty() || slug.is_empty() {
            return None;
        }
        Some(Self {
            country: country.to_string(),
            query_slug: slug.to_string(),
        })
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.country, self.query_slug)
    }
}

/// Lowercase a string and replace every non-alphanumeric run with a single
/// underscore. Runs are collapsed so the result never contains `__`, which
/// snapshot names use as a segment separator.
pub fn safe_slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// A parsed snapshot directory name: partition key plus creation timestamp.
///
/// Format: `jobsnap__{country}__q_{slug}__{YYYYMMDDTHHMMSSZ}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub key: PartitionKey,
    pub timestamp: String,
}

impl SnapshotName {
    /// Name a new snapshot for `key` created at `created`.
    pub fn new(key: PartitionKey, created: DateTime<Utc>) -> Self {
        Self {
            key,
            timestamp: created.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// The directory name this snapshot lives under.
    pub fn dir_name(&self) -> String {
        format!(
            "{}__{}__q_{}__{}",
            SNAPSHOT_PREFIX, self.key.country, self.key.query_slug, self.timestamp
        )
    }

    /// Parse a directory name back into key + timestamp.
    ///
    /// Names carrying the prefix but not the full four-segment layout are
    /// rejected; in particular legacy three-segment country-only names fail
    /// with a distinct message so they are never silently mis-grouped.
    pub fn parse(dir_name: &str) -> Result<Self, IngestError> {
        let parts: Vec<&str> = dir_name.split("__").collect();
        if parts.len() == 3 && parts[0] == SNAPSHOT_PREFIX {
            return Err(IngestError::Validation(format!(
                "legacy country-only snapshot name '{}': re-fetch under the country+query naming scheme",
                dir_name
            )));
        }
        if parts.len() != 4 || parts[0] != SNAPSHOT_PREFIX {
            return Err(IngestError::Validation(format!(
                "unrecognized snapshot name '{}'",
                dir_name
            )));
        }
        let country = parts[1];
        let slug = parts[2].strip_prefix("q_").ok_or_else(|| {
            IngestError::Validation(format!(
                "snapshot name '{}' is missing the q_ query segment",
                dir_name
            ))
        })?;
        let timestamp = parts[3];
        if country.is_empty() || slug.is_empty() {
            return Err(IngestError::Validation(format!(
                "snapshot name '{}' has an empty country or query segment",
                dir_name
            )));
        }
        if NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_err() {
            return Err(IngestError::Validation(format!(
                "snapshot name '{}' has an invalid timestamp '{}'",
                dir_name, timestamp
            )));
        }
        Ok(Self {
            key: PartitionKey {
                country: country.to_string(),
                query_slug: slug.to_string(),
            },
            timestamp: timestamp.to_string(),
        })
    }
}
