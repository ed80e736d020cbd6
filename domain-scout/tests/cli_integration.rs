// domain-scout/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command isolated from the user's config files and DS_* variables.
fn scout(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("domain-scout").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("DS_CONFIG")
        .env_remove("DS_PROVIDERS")
        .env_remove("DS_TIMEOUT")
        .env_remove("DS_BUDGET")
        .env_remove("DS_THROTTLE")
        .env_remove("DS_BACKOFF")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    scout(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("bulk"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_search_help_lists_options() {
    let home = TempDir::new().unwrap();
    scout(&home)
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--providers"))
        .stdout(predicate::str::contains("--whois"))
        .stdout(predicate::str::contains("--exact"));
}

#[test]
fn test_unknown_provider_fails() {
    let home = TempDir::new().unwrap();
    scout(&home)
        .args(["search", "example.com", "--providers", "godaddy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}

#[test]
fn test_bulk_without_domains_fails() {
    let home = TempDir::new().unwrap();
    scout(&home)
        .arg("bulk")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No domains given"));
}

#[test]
fn test_missing_config_file_fails() {
    let home = TempDir::new().unwrap();
    scout(&home)
        .args(["search", "example.com", "--config", "nope.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_invalid_config_file_fails() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("bad.toml");
    fs::write(&path, "[defaults]\ntimeout = \"0s\"\n").unwrap();

    scout(&home)
        .args(["search", "example.com", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than zero"));
}

#[test]
fn test_unconfigured_provider_reports_error_outcome() {
    // no base URL for the marketplace, so nothing goes over the network
    let home = TempDir::new().unwrap();
    scout(&home)
        .args(["search", "example.com", "--providers", "marketplace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"providerId\": \"marketplace\""))
        .stdout(predicate::str::contains("\"domains\": []"))
        .stdout(predicate::str::contains("base_url is not configured"));
}

#[test]
fn test_discovered_config_sets_default_providers() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("domain-scout.toml"),
        "[defaults]\nproviders = [\"reseller\", \"marketplace\"]\n",
    )
    .unwrap();

    let assert = scout(&home).args(["bulk", "a.com", "b.com"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let outcomes: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    let ids: Vec<_> = outcomes
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["providerId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["reseller", "marketplace"]);
}

#[test]
fn test_env_providers_override_config_file() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("domain-scout.toml"),
        "[defaults]\nproviders = [\"reseller\"]\n",
    )
    .unwrap();

    scout(&home)
        .env("DS_PROVIDERS", "marketplace")
        .args(["search", "example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"providerId\": \"marketplace\""))
        .stdout(predicate::str::contains("reseller").not());
}
