//! Client facade
//!
//! One [`WbClient`] owns one rate limiter registry, one transport and the API
//! modules built on top of them. Two clients never share quota.

use std::sync::Arc;

use tracing::info;
use wbgate_core::{RateLimiterRegistry, Transport};
use wbgate_domain::{Category, ClientConfig, Result};

use crate::api::{BaseApi, CommonApi, PricesApi, ReportsApi};
use crate::http::HttpTransport;

#[derive(Debug)]
pub struct WbClient {
    config: ClientConfig,
    limiter: Arc<RateLimiterRegistry>,
    common: CommonApi,
    prices: PricesApi,
    reports: ReportsApi,
}

impl WbClient {
    /// Client backed by the reqwest transport.
    ///
    /// # Errors
    /// `WbError::Config` when the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Client with a caller-supplied transport.
    ///
    /// # Errors
    /// `WbError::Config` when the configuration is invalid.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiterRegistry::new(&config.rate_limits));
        let base = |category| BaseApi::new(category, &config, Arc::clone(&transport), Arc::clone(&limiter));

        let common = CommonApi::new(base(Category::Common));
        let prices = PricesApi::new(base(Category::Prices));
        let reports = ReportsApi::new(base(Category::Analytics));

        info!(sandbox = config.sandbox, "wbgate client ready");
        Ok(Self { config, limiter, common, prices, reports })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Limiter shared by every API module of this client.
    pub fn rate_limiter(&self) -> &Arc<RateLimiterRegistry> {
        &self.limiter
    }

    pub fn common(&self) -> &CommonApi {
        &self.common
    }

    pub fn prices(&self) -> &PricesApi {
        &self.prices
    }

    pub fn reports(&self) -> &ReportsApi {
        &self.reports
    }
}
