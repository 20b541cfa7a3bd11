use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tuning knobs for the fetch-and-snapshot pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// Delay between consecutive successful page fetches within a partition.
    /// Distinct from retry backoff.
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: f64,
    /// Maximum attempts per page, counting the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Concurrent partition fetch jobs in bulk mode. Bounded by the upstream
    /// API's aggregate rate budget.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_results_per_page() -> u32 {
    50
}

fn default_sort_by() -> String {
    "date".to_string()
}

fn default_throttle_secs() -> f64 {
    3.0
}

fn default_max_attempts() -> u32 {
    6
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    2
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            results_per_page: default_results_per_page(),
            sort_by: default_sort_by(),
            throttle_secs: default_throttle_secs(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

/// Upstream API credentials. Loaded from the environment in the CLI layer
/// and passed in explicitly; the core never reads ambient process state.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub app_id: String,
    pub app_key: String,
}

/// Upstream API endpoints plus credentials, explicitly constructed.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Search endpoint base; pages are fetched from
    /// `{search_base_url}/{country}/search/{page}`.
    pub search_base_url: String,
    /// Endpoint serving the reference country list.
    pub countries_url: String,
    pub credentials: ApiCredentials,
}

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
pub const DEFAULT_COUNTRIES_URL: &str = "https://api.intelligence.adzuna.com/api/v1.1/countries/";

impl ApiConfig {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self {
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            credentials,
        }
    }
}

/// One entry of the reference partition list: a country the upstream API
/// supports. The core treats this purely as an iteration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRef {
    pub code: String,
    pub name: String,
}

/// On-disk layout under the root data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Immutable raw snapshots, one directory per snapshot.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Per-partition flattened tables.
    pub fn interim_dir(&self) -> PathBuf {
        self.root.join("interim")
    }

    /// Reference inputs (country list).
    pub fn reference_dir(&self) -> PathBuf {
        self.root.join("reference")
    }

    /// Per-partition advisory lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn countries_file(&self) -> PathBuf {
        self.reference_dir().join("countries.json")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
