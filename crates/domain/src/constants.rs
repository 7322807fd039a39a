//! Platform constants
//!
//! Centralized location for hosts, default quotas, header names and polling
//! defaults used throughout the workspace.

// Throttling headers (lowercase; lookups are case-insensitive)
pub const HEADER_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATELIMIT_RETRY: &str = "x-ratelimit-retry";
pub const HEADER_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

// Rate limiter defaults
pub const DEFAULT_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 60;

// Task polling defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_MAX_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_POLL_BACKOFF_FACTOR: f64 = 1.0;
pub const DEFAULT_MAX_TRANSIENT_FAILURES: u32 = 3;
pub const DEFAULT_MAX_UNKNOWN_CHECKS: u32 = 5;

// Transport defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const USER_AGENT: &str = concat!("wbgate/", env!("CARGO_PKG_VERSION"));
