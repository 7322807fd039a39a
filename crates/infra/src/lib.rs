//! # wbgate Infrastructure
//!
//! Impure adapters around the governance core.
//!
//! This crate contains:
//! - The reqwest-backed [`HttpTransport`]
//! - Configuration loading from environment and files
//! - Tracing subscriber bootstrap
//! - Endpoint modules (common, prices, reports) and the [`WbClient`] facade
//!
//! ## Architecture
//! - Implements the `Transport` port defined in `wbgate-core`
//! - Depends on `wbgate-domain` and `wbgate-core`
//! - Contains all I/O

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;

// Re-export commonly used items
pub use api::{CommonApi, PricesApi, ReportsApi, WaitOptions};
pub use client::WbClient;
pub use http::{HttpTransport, HttpTransportBuilder};
