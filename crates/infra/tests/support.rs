//! Shared helpers for infra integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use wbgate_domain::{BucketLimits, Category, ClientConfig, PollingConfig};
use wbgate_infra::WbClient;
use wiremock::{MockServer, Request, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token";

/// Configuration pointing every category at the mock server, with fast
/// request retries and a one-second polling cadence.
pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(TEST_TOKEN).with_base_url(server.uri());
    config.max_retries = 1;
    config.retry_delay_ms = 10;
    config.timeout_secs = 5;
    config.rate_limits.max_wait_ms = 5_000;
    config.polling = PollingConfig { interval_ms: 1_000, timeout_secs: 10, ..PollingConfig::default() };
    config
}

pub fn client_for(server: &MockServer) -> WbClient {
    WbClient::new(config_for(server)).expect("client should build")
}

/// Client whose `category` bucket holds `burst` tokens refilling at `rpm`.
pub fn client_with_limits(server: &MockServer, category: Category, rpm: u32, burst: u32) -> WbClient {
    let mut config = config_for(server);
    config.rate_limits = config.rate_limits.with_limits(category, BucketLimits::new(rpm, burst));
    WbClient::new(config).expect("client should build")
}

/// Responder answering call `n` (0-based) with `bodies[n]`, repeating the last
/// body once the list runs out.
pub fn sequence(bodies: Vec<Value>) -> (Arc<AtomicUsize>, impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let responder = move |_req: &Request| -> ResponseTemplate {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let body = bodies.get(n).or_else(|| bodies.last()).cloned().unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(body)
    };
    (calls, responder)
}
