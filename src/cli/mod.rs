pub mod ingest;
pub mod process;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::models::DataLayout;

/// jobsnap - snapshot-based job listing ingestion and consolidation
#[derive(Parser, Debug)]
#[command(
    name = "jobsnap",
    version,
    about = "jobsnap - fetch raw job-listing snapshots and derive consolidated tables"
)]
pub struct Cli {
    /// Root data directory (raw/, interim/, reference/ live under it)
    #[arg(long = "data-dir", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a raw snapshot for one (country, query) partition
    Fetch {
        /// Country code (e.g. es, gb, us)
        #[arg(long, default_value = "es")]
        country: String,

        /// Search keywords for job ads
        #[arg(long, default_value = "data")]
        query: String,

        /// Location filter (city/region)
        #[arg(long)]
        location: Option<String>,

        /// Number of pages to fetch (starting at 1)
        #[arg(long, default_value_t = 10)]
        pages: u32,

        /// Results per page (1-50)
        #[arg(long = "results-per-page", default_value_t = 50)]
        results_per_page: u32,

        /// Sort order
        #[arg(long = "sort-by", default_value = "date", value_parser = ["date", "relevance", "salary"])]
        sort_by: String,

        /// Throttle between successful page requests, in seconds
        #[arg(long = "throttle-secs", default_value_t = 3.0)]
        throttle_secs: f64,
    },

    /// Fetch the reference country list
    Countries,

    /// Fetch snapshots for every reference country, one job per partition
    Bulk {
        /// Search queries; one partition per (country, query)
        #[arg(long = "query", value_name = "QUERY")]
        queries: Vec<String>,

        /// Pages per partition
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Results per page (1-50)
        #[arg(long = "results-per-page", default_value_t = 50)]
        results_per_page: u32,

        /// Sort order
        #[arg(long = "sort-by", default_value = "date", value_parser = ["date", "relevance", "salary"])]
        sort_by: String,

        /// Throttle between successful page requests, in seconds
        #[arg(long = "throttle-secs", default_value_t = 3.0)]
        throttle_secs: f64,

        /// Limit the number of countries processed (for testing)
        #[arg(long)]
        limit: Option<usize>,

        /// Concurrent partition fetch jobs
        #[arg(long, default_value_t = 2)]
        concurrency: usize,
    },

    /// Prune old snapshots and flatten the retained ones into per-partition tables
    Flatten {
        /// Keep only records created on or after this date (YYYY-MM-DD, UTC)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Keep only records created on or before this date (YYYY-MM-DD, UTC)
        #[arg(long)]
        until: Option<NaiveDate>,
    },

    /// Merge all per-partition tables into the master table
    Merge,
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let layout = DataLayout::new(&cli.data_dir);
    match &cli.command {
        Some(Commands::Fetch {
            country,
            query,
            location,
            pages,
            results_per_page,
            sort_by,
            throttle_secs,
        }) => {
            ingest::cmd_fetch(
                &layout,
                country,
                query,
                location.as_deref(),
                *pages,
                *results_per_page,
                sort_by,
                *throttle_secs,
            )
            .await
        }
        Some(Commands::Countries) => ingest::cmd_countries(&layout).await,
        Some(Commands::Bulk {
            queries,
            pages,
            results_per_page,
            sort_by,
            throttle_secs,
            limit,
            concurrency,
        }) => {
            ingest::cmd_bulk(
                &layout,
                queries,
                *pages,
                *results_per_page,
                sort_by,
                *throttle_secs,
                *limit,
                *concurrency,
            )
            .await
        }
        Some(Commands::Flatten { since, until }) => {
            process::cmd_flatten(&layout, *since, *until).await
        }
        Some(Commands::Merge) => process::cmd_merge(&layout).await,
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_version_flag() {
        let result = Cli::try_parse_from(["jobsnap", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains("0.1.0"));
    }

    #[test]
    fn test_cli_fetch_defaults() {
        let cli = Cli::try_parse_from(["jobsnap", "fetch"]).expect("parse fetch");
        match &cli.command {
            Some(Commands::Fetch {
                country,
                query,
                location,
                pages,
                results_per_page,
                sort_by,
                throttle_secs,
            }) => {
                assert_eq!(country, "es");
                assert_eq!(query, "data");
                assert!(location.is_none());
                assert_eq!(*pages, 10);
                assert_eq!(*results_per_page, 50);
                assert_eq!(sort_by, "date");
                assert_eq!(*throttle_secs, 3.0);
            }
            other => panic!("Expected Fetch command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_fetch_overrides() {
        let cli = Cli::try_parse_from([
            "jobsnap",
            "fetch",
            "--country",
            "gb",
            "--query",
            "data engineer",
            "--location",
            "London",
            "--pages",
            "3",
            "--results-per-page",
            "25",
            "--sort-by",
            "salary",
            "--throttle-secs",
            "0.5",
        ])
        .expect("parse fetch");
        match &cli.command {
            Some(Commands::Fetch {
                country,
                query,
                location,
                pages,
                results_per_page,
                sort_by,
                throttle_secs,
            }) => {
                assert_eq!(country, "gb");
                assert_eq!(query, "data engineer");
                assert_eq!(location.as_deref(), Some("London"));
                assert_eq!(*pages, 3);
                assert_eq!(*results_per_page, 25);
                assert_eq!(sort_by, "salary");
                assert_eq!(*throttle_secs, 0.5);
            }
            other => panic!("Expected Fetch command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_fetch_rejects_unknown_sort() {
        let result = Cli::try_parse_from(["jobsnap", "fetch", "--sort-by", "chaos"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_bulk_repeated_queries() {
        let cli = Cli::try_parse_from([
            "jobsnap",
            "bulk",
            "--query",
            "Data Engineer",
            "--query",
            "MLOps",
            "--limit",
            "5",
            "--concurrency",
            "4",
        ])
        .expect("parse bulk");
        match &cli.command {
            Some(Commands::Bulk {
                queries,
                limit,
                concurrency,
                pages,
                ..
            }) => {
                assert_eq!(queries, &["Data Engineer", "MLOps"]);
                assert_eq!(*limit, Some(5));
                assert_eq!(*concurrency, 4);
                assert_eq!(*pages, 1);
            }
            other => panic!("Expected Bulk command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_flatten_date_bounds() {
        let cli = Cli::try_parse_from([
            "jobsnap",
            "flatten",
            "--since",
            "2026-01-01",
            "--until",
            "2026-01-31",
        ])
        .expect("parse flatten");
        match &cli.command {
            Some(Commands::Flatten { since, until }) => {
                assert_eq!(
                    *since,
                    Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
                );
                assert_eq!(
                    *until,
                    Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
                );
            }
            other => panic!("Expected Flatten command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_flatten_rejects_bad_date() {
        let result = Cli::try_parse_from(["jobsnap", "flatten", "--since", "January 1st"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_data_dir() {
        let cli = Cli::try_parse_from(["jobsnap", "merge", "--data-dir", "/tmp/jsdata"])
            .expect("parse merge");
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/jsdata"));
        assert!(matches!(cli.command, Some(Commands::Merge)));
    }

    #[test]
    fn test_cli_default_data_dir() {
        let cli = Cli::try_parse_from(["jobsnap", "countries"]).expect("parse countries");
        assert_eq!(cli.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["jobsnap", "-v", "merge"]).expect("parse -v");
        assert!(cli.verbose);
    }
}
