//! Common API: connectivity check and seller information

use serde::{Deserialize, Serialize};
use tracing::instrument;
use wbgate_domain::Result;

use super::base::BaseApi;

/// Answer of the `/ping` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    #[serde(rename = "TS", default)]
    pub timestamp: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// Seller account details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerInfo {
    pub name: String,
    pub sid: String,
    #[serde(default)]
    pub trade_mark: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommonApi {
    base: BaseApi,
}

impl CommonApi {
    pub fn new(base: BaseApi) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BaseApi {
        &self.base
    }

    /// Check that the token is accepted and the platform is reachable.
    ///
    /// # Errors
    /// Any error from the request pipeline.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<PingResponse> {
        self.base.get("/ping", &[]).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    #[instrument(skip(self))]
    pub async fn seller_info(&self) -> Result<SellerInfo> {
        self.base.get("/api/v1/seller-info", &[]).await
    }
}
