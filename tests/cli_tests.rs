//! CLI integration tests using assert_cmd.
//!
//! These tests invoke the actual `jobsnap` binary and verify its output.
//! Network-touching commands are only exercised on their local failure
//! paths; the fetch pipeline itself is covered in `pipeline_tests.rs`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn jobsnap_cmd() -> Command {
    let mut cmd = Command::cargo_bin("jobsnap").expect("binary should exist");
    // Keep ambient credentials out of the tests.
    cmd.env_remove("ADZUNA_APP_ID");
    cmd.env_remove("ADZUNA_APP_KEY");
    cmd
}

#[test]
fn test_version_flag() {
    jobsnap_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_lists_subcommands() {
    jobsnap_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("countries"))
        .stdout(predicate::str::contains("bulk"))
        .stdout(predicate::str::contains("flatten"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn test_fetch_help_shows_options() {
    jobsnap_cmd()
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--country"))
        .stdout(predicate::str::contains("--query"))
        .stdout(predicate::str::contains("--pages"))
        .stdout(predicate::str::contains("--results-per-page"))
        .stdout(predicate::str::contains("--sort-by"))
        .stdout(predicate::str::contains("--throttle-secs"));
}

#[test]
fn test_fetch_without_credentials_fails_with_hint() {
    let tmp = TempDir::new().expect("create temp dir");
    jobsnap_cmd()
        .current_dir(tmp.path())
        .args(["fetch", "--country", "gb", "--query", "data", "--pages", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ADZUNA_APP_ID"));
}

#[test]
fn test_fetch_rejects_out_of_range_results_per_page() {
    let tmp = TempDir::new().expect("create temp dir");
    jobsnap_cmd()
        .current_dir(tmp.path())
        .args(["fetch", "--results-per-page", "51"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 50"));
}

#[test]
fn test_bulk_without_country_list_fails_with_hint() {
    let tmp = TempDir::new().expect("create temp dir");
    jobsnap_cmd()
        .current_dir(tmp.path())
        .args(["bulk", "--data-dir"])
        .arg(tmp.path().join("data"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("jobsnap countries"));
}

#[test]
fn test_flatten_rejects_malformed_date() {
    jobsnap_cmd()
        .args(["flatten", "--since", "January 1st"])
        .assert()
        .failure();
}

#[test]
fn test_flatten_on_empty_data_dir_succeeds() {
    let tmp = TempDir::new().expect("create temp dir");
    jobsnap_cmd()
        .arg("flatten")
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0 partition tables written"));
}

#[test]
fn test_merge_on_empty_data_dir_reports_nothing_to_do() {
    let tmp = TempDir::new().expect("create temp dir");
    jobsnap_cmd()
        .arg("merge")
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No partition tables found to merge."));
}

#[test]
fn test_no_subcommand_prints_help() {
    jobsnap_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}
