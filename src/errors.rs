use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Transient transport-level failure (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 from the upstream API, optionally carrying a server-specified
    /// wait in seconds.
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited { retry_after: Option<u64> },

    /// Transient upstream failure (HTTP 500/502/503/504).
    #[error("upstream server error: HTTP {status}")]
    Server { status: u16 },

    /// Non-retryable HTTP status. Fatal to the in-progress snapshot.
    #[error("upstream client error: HTTP {status}: {body}")]
    Client { status: u16, body: String },

    /// A page file unreadable or a manifest malformed; recovered locally by
    /// skipping the affected unit.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A partition table's columns diverge from the established master schema.
    #[error("schema mismatch for partition {partition}: expected columns [{expected}], found [{actual}]")]
    SchemaMismatch {
        partition: String,
        expected: String,
        actual: String,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl IngestError {
    /// Whether the fetch path may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Network(_) | IngestError::RateLimited { .. } | IngestError::Server { .. }
        )
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Integrity(err.to_string())
    }
}
