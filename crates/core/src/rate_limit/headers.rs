//! Throttle header adapter
//!
//! Turns the platform's throttling headers into a normalized [`ThrottleHint`].
//! Header names differ between categories on some deployments, so the
//! default parser keeps a per-category [`HeaderNames`] table.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wbgate_domain::constants::{
    HEADER_RATELIMIT_LIMIT, HEADER_RATELIMIT_REMAINING, HEADER_RATELIMIT_RESET,
    HEADER_RATELIMIT_RETRY, HEADER_RETRY_AFTER,
};
use wbgate_domain::{Category, ResponseHeaders};

/// Throttling metadata carried by one response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottleHint {
    /// Requests left in the current server window.
    pub remaining: Option<u32>,
    /// Time until the server window fully replenishes.
    pub reset_after: Option<Duration>,
    /// Window size advertised by the server.
    pub limit: Option<u32>,
}

impl ThrottleHint {
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_after.is_none() && self.limit.is_none()
    }
}

/// Parses response headers into throttling hints.
pub trait ThrottleHeaderParser: Send + Sync {
    /// Quota hints, or `None` when the response carries none.
    fn parse(&self, category: Category, headers: &ResponseHeaders) -> Option<ThrottleHint>;

    /// Server-requested wait after a 429, if advertised.
    fn retry_after(&self, category: Category, headers: &ResponseHeaders) -> Option<Duration>;
}

/// Header names used for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    pub remaining: String,
    pub reset: String,
    pub retry: String,
    pub limit: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            remaining: HEADER_RATELIMIT_REMAINING.to_string(),
            reset: HEADER_RATELIMIT_RESET.to_string(),
            retry: HEADER_RATELIMIT_RETRY.to_string(),
            limit: HEADER_RATELIMIT_LIMIT.to_string(),
        }
    }
}

/// Default parser for the `x-ratelimit-*` family, with `retry-after` as the
/// fallback retry hint.
#[derive(Debug, Clone, Default)]
pub struct HeaderThrottleParser {
    defaults: HeaderNames,
    overrides: HashMap<Category, HeaderNames>,
}

impl HeaderThrottleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different header names for one category.
    pub fn with_names(mut self, category: Category, names: HeaderNames) -> Self {
        self.overrides.insert(category, names);
        self
    }

    fn names(&self, category: Category) -> &HeaderNames {
        self.overrides.get(&category).unwrap_or(&self.defaults)
    }
}

impl ThrottleHeaderParser for HeaderThrottleParser {
    fn parse(&self, category: Category, headers: &ResponseHeaders) -> Option<ThrottleHint> {
        let names = self.names(category);
        let hint = ThrottleHint {
            remaining: headers.get(&names.remaining).and_then(parse_count),
            reset_after: headers.get(&names.reset).and_then(parse_seconds),
            limit: headers.get(&names.limit).and_then(parse_count),
        };
        (!hint.is_empty()).then_some(hint)
    }

    fn retry_after(&self, category: Category, headers: &ResponseHeaders) -> Option<Duration> {
        let names = self.names(category);
        headers
            .get(&names.retry)
            .and_then(parse_seconds)
            .or_else(|| headers.get(HEADER_RETRY_AFTER).and_then(parse_retry_after))
    }
}

fn parse_count(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

/// Integer or fractional seconds; negatives and non-finite values are
/// rejected.
fn parse_seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// `Retry-After` is either delta-seconds or an HTTP date.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    parse_seconds(raw).or_else(|| {
        let at = DateTime::parse_from_rfc2822(raw.trim()).ok()?.with_timezone(&Utc);
        Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    })
}
