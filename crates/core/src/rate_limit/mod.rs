//! Client-side rate limiting
//!
//! - [`Bucket`]: pure token-bucket arithmetic for one category
//! - [`RateLimiterRegistry`]: FIFO admission per category plus server feedback
//! - [`ThrottleHeaderParser`]: turns response headers into [`ThrottleHint`]s

pub mod bucket;
pub mod headers;
pub mod registry;

pub use bucket::{Bucket, BucketState};
pub use headers::{HeaderNames, HeaderThrottleParser, ThrottleHeaderParser, ThrottleHint};
pub use registry::{Admitted, RateLimiterRegistry};
