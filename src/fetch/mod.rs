//! Rate-aware page fetching against the upstream search API.
//!
//! `HttpPageSource` issues one paginated GET per call with retry and
//! exponential backoff. It is pure with respect to ingestion state: it never
//! writes, and identical inputs always attempt the identical request.

pub mod cancel;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;

use crate::errors::IngestError;
use crate::fetch::cancel::CancelToken;
use crate::models::{ApiConfig, CountryRef, FetchConfig};

pub const USER_AGENT: &str = "jobsnap/0.1 (respectful rate limiting)";

/// Base delay before the first retry.
const BACKOFF_BASE_MILLIS: u64 = 1500;

/// Search parameters for one partition, minus credentials.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Free-text query (`what` upstream).
    pub query: String,
    /// Optional location filter (`where` upstream).
    pub location: Option<String>,
    pub results_per_page: u32,
    pub sort_by: String,
}

impl SearchParams {
    /// Full query string pairs for a request, credentials included.
    pub fn to_query(&self, api: &ApiConfig) -> Vec<(String, String)> {
        let mut query = vec![
            ("app_id".to_string(), api.credentials.app_id.clone()),
            ("app_key".to_string(), api.credentials.app_key.clone()),
            (
                "results_per_page".to_string(),
                self.results_per_page.to_string(),
            ),
            ("what".to_string(), self.query.clone()),
            ("content-type".to_string(), "application/json".to_string()),
            ("sort_by".to_string(), self.sort_by.clone()),
        ];
        if let Some(location) = &self.location {
            query.push(("where".to_string(), location.clone()));
        }
        query
    }

    /// The same parameters with credential-bearing fields redacted, for the
    /// snapshot manifest.
    pub fn redacted_template(&self) -> BTreeMap<String, String> {
        let mut template = BTreeMap::from([
            ("app_id".to_string(), "***".to_string()),
            ("app_key".to_string(), "***".to_string()),
            (
                "results_per_page".to_string(),
                self.results_per_page.to_string(),
            ),
            ("what".to_string(), self.query.clone()),
            ("content-type".to_string(), "application/json".to_string()),
            ("sort_by".to_string(), self.sort_by.clone()),
        ]);
        if let Some(location) = &self.location {
            template.insert("where".to_string(), location.clone());
        }
        template
    }
}

/// One fetched page: index, verbatim body bytes, and the result count parsed
/// from a copy (None when the body is not JSON; content stays opaque).
#[derive(Debug, Clone)]
pub struct RawPage {
    pub page: u32,
    pub body: Vec<u8>,
    pub results_count: Option<u64>,
}

/// Seam between the snapshot writer and the network, so capture logic can be
/// exercised against a test double.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        country: &str,
        page: u32,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> Result<RawPage, IngestError>;
}

/// Backoff before retry number `retry` (1-based): 1.5s doubling per retry,
/// capped only by the max-attempt count. Non-decreasing in `retry`.
pub fn backoff_delay(retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(20);
    Duration::from_millis(BACKOFF_BASE_MILLIS << exponent)
}

/// Classify a non-success HTTP status per the retry policy.
fn transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn count_results(body: &[u8]) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("results")?.as_array().map(|a| a.len() as u64)
}

/// reqwest-backed implementation of [`PageSource`].
pub struct HttpPageSource {
    client: reqwest::Client,
    api: ApiConfig,
    max_attempts: u32,
}

impl HttpPageSource {
    pub fn new(api: ApiConfig, fetch: &FetchConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()
            .map_err(|e| IngestError::Network(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api,
            max_attempts: fetch.max_attempts.max(1),
        })
    }

    fn page_url(&self, country: &str, page: u32) -> String {
        format!("{}/{}/search/{}", self.api.search_base_url, country, page)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(
        &self,
        country: &str,
        page: u32,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> Result<RawPage, IngestError> {
        let url = self.page_url(country, page);
        let query = params.to_query(&self.api);
        let mut retries = 0u32;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            let response = match self.client.get(&url).query(&query).send().await {
                Ok(response) => response,
                Err(e) => {
                    let err = IngestError::Network(e.to_string());
                    if attempt == self.max_attempts {
                        return Err(err);
                    }
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "page {} of {}: {} (attempt {}/{}), retrying in {:.1}s",
                        page,
                        country,
                        err,
                        attempt,
                        self.max_attempts,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            if transient_status(status) {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let err = if status == 429 {
                    IngestError::RateLimited { retry_after }
                } else {
                    IngestError::Server { status }
                };
                if attempt == self.max_attempts {
                    return Err(err);
                }
                retries += 1;
                // A server-specified wait overrides the computed backoff for
                // this attempt only.
                let delay = retry_after
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff_delay(retries));
                tracing::warn!(
                    "page {} of {}: {} (attempt {}/{}), retrying in {:.1}s",
                    page,
                    country,
                    err,
                    attempt,
                    self.max_attempts,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !response.status().is_success() {
                let body = response.text().await.unwrap_or_default();
                let truncated: String = body.chars().take(300).collect();
                return Err(IngestError::Client {
                    status,
                    body: truncated,
                });
            }

            match response.bytes().await {
                Ok(bytes) => {
                    let body = bytes.to_vec();
                    let results_count = count_results(&body);
                    return Ok(RawPage {
                        page,
                        body,
                        results_count,
                    });
                }
                Err(e) => {
                    let err = IngestError::Network(format!("reading response body: {}", e));
                    if attempt == self.max_attempts {
                        return Err(err);
                    }
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "page {} of {}: {} (attempt {}/{}), retrying in {:.1}s",
                        page,
                        country,
                        err,
                        attempt,
                        self.max_attempts,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(IngestError::Network(format!(
            "page {} of {}: retries exhausted",
            page, country
        )))
    }
}

/// Fetch the reference country list from the intelligence endpoint.
/// A thin bootstrap collaborator; no retry policy beyond the client timeout.
pub async fn fetch_country_list(api: &ApiConfig) -> Result<Vec<CountryRef>, IngestError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| IngestError::Network(format!("building HTTP client: {}", e)))?;

    let response = client
        .get(&api.countries_url)
        .query(&[
            ("app_id", api.credentials.app_id.as_str()),
            ("app_key", api.credentials.app_key.as_str()),
        ])
        .send()
        .await
        .map_err(|e| IngestError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IngestError::Client {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        });
    }

    response
        .json::<Vec<CountryRef>>()
        .await
        .map_err(|e| IngestError::Integrity(format!("parsing country list: {}", e)))
}
