//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the process environment, when one exists
//! 2. Attempts to load from environment variables
//! 3. If the token is missing, falls back to loading from file
//! 4. Searches multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `WB_API_TOKEN`: Seller API token (required)
//! - `WB_SANDBOX`: Use sandbox hosts (true/false)
//! - `WB_BASE_URL`: Send every category to this origin
//! - `WB_TIMEOUT_SECS`: Request timeout in seconds
//! - `WB_MAX_RETRIES`: Transport retries after the first attempt
//! - `WB_RETRY_DELAY_MS`: Base transport retry delay in milliseconds
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./wbgate.toml` or `./wbgate.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names one and two directories up
//! 4. Relative to executable location
//!
//! A file without a token picks it up from `WB_API_TOKEN`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use wbgate_domain::{ClientConfig, Result, WbError};

const FILE_NAMES: [&str; 4] = ["wbgate.toml", "wbgate.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the token is not
/// set, falls back to loading from a config file.
///
/// # Errors
/// Returns `WbError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The resulting configuration fails validation
pub fn load() -> Result<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!(sandbox = config.sandbox, "Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `WB_API_TOKEN` must be present; everything else falls back to defaults.
///
/// # Errors
/// Returns `WbError::Config` if the token is missing or a variable has an
/// invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let token = env_var("WB_API_TOKEN")?;
    let mut config = ClientConfig::new(token).sandbox(env_bool("WB_SANDBOX", false));

    if let Ok(base_url) = std::env::var("WB_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Some(timeout_secs) = env_parse("WB_TIMEOUT_SECS", "timeout")? {
        config.timeout_secs = timeout_secs;
    }
    if let Some(max_retries) = env_parse("WB_MAX_RETRIES", "max retries")? {
        config.max_retries = max_retries;
    }
    if let Some(retry_delay_ms) = env_parse("WB_RETRY_DELAY_MS", "retry delay")? {
        config.retry_delay_ms = retry_delay_ms;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `WbError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The resulting configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(WbError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => search_config_paths().ok_or_else(|| {
            WbError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| WbError::Config(format!("Failed to read config file: {}", e)))?;

    let mut config = parse_config(&contents, &config_path)?;
    if config.token.trim().is_empty() {
        if let Ok(token) = std::env::var("WB_API_TOKEN") {
            config.token = token;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `WbError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| WbError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| WbError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(WbError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Search multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn search_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `WbError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| WbError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional numeric environment variable.
fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| WbError::Config(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;
    use wbgate_domain::{BucketLimits, Category};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 6] = [
        "WB_API_TOKEN",
        "WB_SANDBOX",
        "WB_BASE_URL",
        "WB_TIMEOUT_SECS",
        "WB_MAX_RETRIES",
        "WB_RETRY_DELAY_MS",
    ];

    fn clear_env() {
        for key in VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("WBGATE_TEST_BOOL_YES", "yes");
        std::env::set_var("WBGATE_TEST_BOOL_UPPER", "TRUE");
        std::env::set_var("WBGATE_TEST_BOOL_OFF", "off");

        assert!(env_bool("WBGATE_TEST_BOOL_YES", false));
        assert!(env_bool("WBGATE_TEST_BOOL_UPPER", false));
        assert!(!env_bool("WBGATE_TEST_BOOL_OFF", true));

        std::env::remove_var("WBGATE_TEST_BOOL_MISSING");
        assert!(env_bool("WBGATE_TEST_BOOL_MISSING", true));

        std::env::remove_var("WBGATE_TEST_BOOL_YES");
        std::env::remove_var("WBGATE_TEST_BOOL_UPPER");
        std::env::remove_var("WBGATE_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("WB_API_TOKEN", "env-token");
        std::env::set_var("WB_SANDBOX", "true");
        std::env::set_var("WB_TIMEOUT_SECS", "12");
        std::env::set_var("WB_MAX_RETRIES", "5");
        std::env::set_var("WB_RETRY_DELAY_MS", "250");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.token, "env-token");
        assert!(config.sandbox);
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 250);
    }

    #[test]
    fn test_load_from_env_missing_token() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, WbError::Config(_)), "Should be a Config error");
        assert!(err.to_string().contains("WB_API_TOKEN"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("WB_API_TOKEN", "env-token");
        std::env::set_var("WB_TIMEOUT_SECS", "soon");

        let result = load_from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(matches!(err, WbError::Config(_)), "Should be a Config error");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_load_from_file_toml() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        let path = temp_config(
            r#"
token = "file-token"
sandbox = true

[rate_limits.overrides.prices]
requests_per_minute = 10
burst = 1

[polling]
interval_ms = 3000
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from TOML file");
        assert_eq!(config.token, "file-token");
        assert!(config.sandbox);
        assert_eq!(config.rate_limits.limits_for(Category::Prices), BucketLimits::new(10, 1));
        assert_eq!(config.polling.interval_ms, 3000);
    }

    #[test]
    fn test_load_from_file_json_takes_token_from_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("WB_API_TOKEN", "env-token");

        let path = temp_config(r#"{ "timeout_secs": 9 }"#, "json");
        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        clear_env();

        let config = result.expect("config from JSON file");
        assert_eq!(config.token, "env-token");
        assert_eq!(config.timeout_secs, 9);
    }

    #[test]
    fn test_load_from_file_without_token_fails_validation() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let path = temp_config(r#"{ "sandbox": true }"#, "json");
        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(WbError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/wbgate.toml")));
        let err = result.unwrap_err();
        assert!(matches!(err, WbError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = temp_config(r#"{ "this is": "not valid json" "#, "json");
        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        assert!(result.is_err(), "Should fail with invalid JSON");
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("token: abc", &PathBuf::from("wbgate.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
