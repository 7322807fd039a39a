//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! building a client from the result.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use wbgate_domain::{BucketLimits, Category, ProgressNotify, WbError};
use wbgate_infra::{config, WbClient};

/// Write `contents` to a temp file with the given extension. The returned
/// guard keeps the original temp file alive; the copy is removed by the test.
fn write_config(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "token": "json-token",
        "sandbox": true,
        "timeout_secs": 15,
        "max_retries": 2,
        "rate_limits": {
            "default_backoff_ms": 3000,
            "overrides": {
                "prices": { "requests_per_minute": 30, "burst": 3 }
            }
        },
        "polling": {
            "interval_ms": 5000,
            "timeout_secs": 120,
            "notify": "on_change"
        }
    }"#;
    let (_guard, path) = write_config(json_content, "json");

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config from JSON file");

    assert_eq!(config.token, "json-token");
    assert!(config.sandbox);
    assert_eq!(config.timeout(), Duration::from_secs(15));
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.rate_limits.default_backoff(), Duration::from_millis(3000));
    assert_eq!(config.rate_limits.limits_for(Category::Prices), BucketLimits::new(30, 3));
    assert_eq!(config.rate_limits.limits_for(Category::Content), Category::Content.default_limits());
    assert_eq!(config.polling.interval_ms, 5000);
    assert_eq!(config.polling.notify, ProgressNotify::OnChange);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
token = "toml-token"
base_url = "http://127.0.0.1:8080"
retry_delay_ms = 250

[rate_limits]
max_wait_ms = 10000

[rate_limits.overrides.analytics]
requests_per_minute = 3
burst = 1

[polling]
timeout_secs = 600
backoff_factor = 2.0
"#;
    let (_guard, path) = write_config(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config from TOML file");

    assert_eq!(config.token, "toml-token");
    assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:8080"));
    assert_eq!(config.retry_delay(), Duration::from_millis(250));
    assert_eq!(config.rate_limits.max_wait(), Duration::from_secs(10));
    assert_eq!(config.rate_limits.limits_for(Category::Analytics), BucketLimits::new(3, 1));
    assert_eq!(config.polling.timeout_secs, 600);
    assert!((config.polling.backoff_factor - 2.0).abs() < f64::EPSILON);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_loaded_config_builds_a_client() {
    let (_guard, path) = write_config(
        r#"{ "token": "client-token", "rate_limits": { "overrides": { "common": { "requests_per_minute": 60, "burst": 2 } } } }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config");
    let client = WbClient::new(config).expect("Failed to build client");

    assert_eq!(client.rate_limiter().state(Category::Common).capacity, 2);
    assert_eq!(client.common().base().base_url(), "https://common-api.wildberries.ru");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let (_guard, path) = write_config(
        r#"{ "token": "t", "rate_limits": { "overrides": { "prices": { "requests_per_minute": 60, "burst": 0 } } } }"#,
        "json",
    );

    match config::load_from_file(Some(path.clone())) {
        Err(WbError::Config(msg)) => assert!(msg.contains("burst"), "unexpected message: {msg}"),
        other => panic!("Expected Config error, got {other:?}"),
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/config.json".into()));

    match result {
        Err(WbError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let (_guard, path) = write_config(r#"{ "this is": "not valid" "#, "json");

    match config::load_from_file(Some(path.clone())) {
        Err(WbError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_with_unsupported_extension() {
    let (_guard, path) = write_config("token: yaml", "yaml");

    match config::load_from_file(Some(path.clone())) {
        Err(WbError::Config(msg)) => assert!(msg.contains("Unsupported")),
        other => panic!("Expected Config error, got {other:?}"),
    }

    std::fs::remove_file(path).ok();
}
