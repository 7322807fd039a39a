//! # wbgate Core
//!
//! Request governance for the seller API - no HTTP stack.
//!
//! This crate contains:
//! - Per-category token buckets and the FIFO rate limiter registry
//! - The throttle header adapter
//! - The task poller state machine
//! - Port interfaces (traits) for the transport
//!
//! ## Architecture Principles
//! - Only depends on `wbgate-domain`
//! - No network or file system access
//! - Time comes from `tokio::time`, so tests run on a paused clock

pub mod ports;
pub mod rate_limit;
pub mod tasks;

// Re-export commonly used items
pub use ports::Transport;
pub use rate_limit::{
    Admitted, Bucket, BucketState, HeaderNames, HeaderThrottleParser, RateLimiterRegistry,
    ThrottleHeaderParser, ThrottleHint,
};
pub use tasks::{
    wait_for_task, PollState, PollerConfig, ProgressCallback, TaskCompletion, TaskOutcome,
    TaskPoller,
};
