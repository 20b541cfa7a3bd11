pub mod config;
pub mod manifest;
pub mod partition;
pub mod record;

pub use config::{ApiConfig, ApiCredentials, CountryRef, DataLayout, FetchConfig};
pub use manifest::{PageMeta, SnapshotManifest, MANIFEST_FILE};
pub use partition::{safe_slug, PartitionKey, SnapshotName, SNAPSHOT_PREFIX, TIMESTAMP_FORMAT};
pub use record::{JobRecord, TABLE_COLUMNS};
