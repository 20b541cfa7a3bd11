//! Ingestion commands: fetch, bulk, countries.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::fetch::cancel::CancelToken;
use crate::fetch::{self, HttpPageSource, SearchParams};
use crate::models::{
    ApiConfig, ApiCredentials, CountryRef, DataLayout, FetchConfig, PartitionKey,
};
use crate::snapshot::writer::SnapshotWriter;

const APP_ID_VAR: &str = "ADZUNA_APP_ID";
const APP_KEY_VAR: &str = "ADZUNA_APP_KEY";
const SEARCH_BASE_URL_VAR: &str = "JOBSNAP_SEARCH_BASE_URL";
const COUNTRIES_URL_VAR: &str = "JOBSNAP_COUNTRIES_URL";

/// Resolve API credentials and endpoint overrides from the environment.
///
/// This is the only place ambient process state is read; everything below
/// the CLI layer receives an explicit `ApiConfig`.
pub fn load_api_config() -> Result<ApiConfig> {
    let app_id = std::env::var(APP_ID_VAR).ok().filter(|v| !v.is_empty());
    let app_key = std::env::var(APP_KEY_VAR).ok().filter(|v| !v.is_empty());
    let (app_id, app_key) = match (app_id, app_key) {
        (Some(id), Some(key)) => (id, key),
        _ => bail!(
            "Missing {} / {} in environment (tip: put them in a .env file)",
            APP_ID_VAR,
            APP_KEY_VAR
        ),
    };

    let mut api = ApiConfig::new(ApiCredentials { app_id, app_key });
    if let Ok(url) = std::env::var(SEARCH_BASE_URL_VAR) {
        if !url.is_empty() {
            api.search_base_url = url.trim_end_matches('/').to_string();
        }
    }
    if let Ok(url) = std::env::var(COUNTRIES_URL_VAR) {
        if !url.is_empty() {
            api.countries_url = url;
        }
    }
    Ok(api)
}

fn validate_results_per_page(results_per_page: u32) -> Result<()> {
    if !(1..=50).contains(&results_per_page) {
        bail!("results-per-page must be between 1 and 50");
    }
    Ok(())
}

/// Cancellation token flipped by Ctrl-C; honored between attempts and pages.
fn ctrl_c_token() -> CancelToken {
    let token = CancelToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current page and stopping");
            signal_token.cancel();
        }
    });
    token
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_fetch(
    layout: &DataLayout,
    country: &str,
    query: &str,
    location: Option<&str>,
    pages: u32,
    results_per_page: u32,
    sort_by: &str,
    throttle_secs: f64,
) -> Result<()> {
    validate_results_per_page(results_per_page)?;
    let key = PartitionKey::new(country, query);
    if key.country.is_empty() || key.query_slug.is_empty() {
        bail!("country and query must be non-empty after normalization");
    }

    let api = load_api_config()?;
    let fetch_config = FetchConfig {
        results_per_page,
        sort_by: sort_by.to_string(),
        throttle_secs,
        ..FetchConfig::default()
    };
    let source = HttpPageSource::new(api, &fetch_config)
        .with_context(|| format!("partition {}: building fetch client", key))?;
    let writer = SnapshotWriter::new(layout.raw_dir(), throttle_secs);
    let params = SearchParams {
        query: query.to_string(),
        location: location.map(str::to_string),
        results_per_page,
        sort_by: sort_by.to_string(),
    };

    let outcome = writer
        .capture(&source, &key, &params, pages, &ctrl_c_token())
        .await
        .with_context(|| format!("partition {}: snapshot capture failed", key))?;

    println!("Snapshot created: {}", outcome.snapshot_id);
    println!("RAW saved under: {}", outcome.path.display());
    println!(
        "Pages fetched: {} ({} results)",
        outcome.pages_fetched, outcome.total_results
    );
    Ok(())
}

pub async fn cmd_countries(layout: &DataLayout) -> Result<()> {
    let api = load_api_config()?;
    let countries = fetch::fetch_country_list(&api)
        .await
        .context("fetching reference country list")?;

    let path = layout.countries_file();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(&countries)?;
    tokio::fs::write(&path, json.as_bytes())
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Country list saved to {} ({} countries)", path.display(), countries.len());
    Ok(())
}

async fn load_country_list(layout: &DataLayout) -> Result<Vec<CountryRef>> {
    let path = layout.countries_file();
    let content = tokio::fs::read_to_string(&path).await.with_context(|| {
        format!(
            "{} not found. Run `jobsnap countries` first",
            path.display()
        )
    })?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_bulk(
    layout: &DataLayout,
    queries: &[String],
    pages: u32,
    results_per_page: u32,
    sort_by: &str,
    throttle_secs: f64,
    limit: Option<usize>,
    concurrency: usize,
) -> Result<()> {
    validate_results_per_page(results_per_page)?;
    if concurrency == 0 {
        bail!("concurrency must be at least 1");
    }

    let mut countries = load_country_list(layout).await?;
    if let Some(limit) = limit {
        countries.truncate(limit);
    }
    let queries: Vec<String> = if queries.is_empty() {
        vec!["data".to_string()]
    } else {
        queries.to_vec()
    };

    let api = load_api_config()?;
    let fetch_config = FetchConfig {
        results_per_page,
        sort_by: sort_by.to_string(),
        throttle_secs,
        concurrency,
        ..FetchConfig::default()
    };
    let source = Arc::new(
        HttpPageSource::new(api, &fetch_config).context("building fetch client")?,
    );
    let writer = Arc::new(SnapshotWriter::new(layout.raw_dir(), throttle_secs));
    let cancel = ctrl_c_token();
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let total = countries.len() * queries.len();
    println!(
        "Starting bulk ingestion: {} partitions ({} countries x {} queries), concurrency {}",
        total,
        countries.len(),
        queries.len(),
        concurrency
    );

    // Distinct partitions share no mutable state, so each runs as its own
    // task; the semaphore keeps us inside the aggregate rate budget.
    let mut tasks: JoinSet<(PartitionKey, Result<u32, crate::errors::IngestError>)> =
        JoinSet::new();
    for query in &queries {
        for country in &countries {
            let key = PartitionKey::new(&country.code, query);
            let params = SearchParams {
                query: query.clone(),
                location: None,
                results_per_page,
                sort_by: sort_by.to_string(),
            };
            let source = Arc::clone(&source);
            let writer = Arc::clone(&writer);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (key, Err(crate::errors::IngestError::Cancelled)),
                };
                if cancel.is_cancelled() {
                    return (key, Err(crate::errors::IngestError::Cancelled));
                }
                let result = writer
                    .capture(source.as_ref(), &key, &params, pages, &cancel)
                    .await
                    .map(|outcome| outcome.pages_fetched);
                (key, result)
            });
        }
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, Ok(pages_fetched))) => {
                succeeded += 1;
                println!("  [{}/{}] {} ok ({} pages)", succeeded + failed, total, key, pages_fetched);
            }
            Ok((key, Err(e))) => {
                failed += 1;
                tracing::warn!("partition {}: snapshot capture failed: {}", key, e);
                println!("  [{}/{}] {} FAILED: {}", succeeded + failed, total, key, e);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("fetch task panicked: {}", e);
            }
        }
    }

    println!(
        "Bulk ingestion completed: {} succeeded, {} failed",
        succeeded, failed
    );
    Ok(())
}
