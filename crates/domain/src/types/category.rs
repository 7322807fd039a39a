//! API traffic categories
//!
//! Every endpoint of the platform belongs to exactly one category. Each
//! category lives on its own host and is throttled independently by the
//! server, so the client keeps one token bucket per category.

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// Independently rate-limited partition of the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Content,
    Analytics,
    Prices,
    Marketplace,
    Statistics,
    Promotion,
    Feedbacks,
    Chat,
    Supplies,
    Returns,
    Documents,
    Finance,
    Common,
}

impl_wire_name_conversions!(Category {
    Content => "content",
    Analytics => "analytics",
    Prices => "prices",
    Marketplace => "marketplace",
    Statistics => "statistics",
    Promotion => "promotion",
    Feedbacks => "feedbacks",
    Chat => "chat",
    Supplies => "supplies",
    Returns => "returns",
    Documents => "documents",
    Finance => "finance",
    Common => "common",
});

/// Per-category quota: steady-state rate and burst size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLimits {
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl BucketLimits {
    pub const fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self { requests_per_minute, burst }
    }

    /// Tokens added per second.
    pub fn refill_per_second(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 13] = [
        Category::Content,
        Category::Analytics,
        Category::Prices,
        Category::Marketplace,
        Category::Statistics,
        Category::Promotion,
        Category::Feedbacks,
        Category::Chat,
        Category::Supplies,
        Category::Returns,
        Category::Documents,
        Category::Finance,
        Category::Common,
    ];

    /// Production host serving this category.
    pub const fn host(&self) -> &'static str {
        match self {
            Self::Content => "content-api.wildberries.ru",
            Self::Analytics => "seller-analytics-api.wildberries.ru",
            Self::Prices => "discounts-prices-api.wildberries.ru",
            Self::Marketplace => "marketplace-api.wildberries.ru",
            Self::Statistics => "statistics-api.wildberries.ru",
            Self::Promotion => "advert-api.wildberries.ru",
            Self::Feedbacks => "feedbacks-api.wildberries.ru",
            Self::Chat => "buyer-chat-api.wildberries.ru",
            Self::Supplies => "supplies-api.wildberries.ru",
            Self::Returns => "returns-api.wildberries.ru",
            Self::Documents => "documents-api.wildberries.ru",
            Self::Finance => "finance-api.wildberries.ru",
            Self::Common => "common-api.wildberries.ru",
        }
    }

    /// Sandbox host, when the platform offers one for this category.
    pub const fn sandbox_host(&self) -> Option<&'static str> {
        match self {
            Self::Content => Some("content-api-sandbox.wildberries.ru"),
            Self::Prices => Some("discounts-prices-api-sandbox.wildberries.ru"),
            Self::Statistics => Some("statistics-api-sandbox.wildberries.ru"),
            Self::Promotion => Some("advert-api-sandbox.wildberries.ru"),
            Self::Feedbacks => Some("feedbacks-api-sandbox.wildberries.ru"),
            _ => None,
        }
    }

    /// Host to use for the given environment. Categories without a sandbox
    /// fall back to production.
    pub fn resolve_host(&self, sandbox: bool) -> &'static str {
        if sandbox {
            self.sandbox_host().unwrap_or_else(|| self.host())
        } else {
            self.host()
        }
    }

    /// Built-in quota for this category.
    pub const fn default_limits(&self) -> BucketLimits {
        match self {
            // prices: 10 requests per 6 seconds
            Self::Content | Self::Prices => BucketLimits::new(100, 5),
            Self::Marketplace => BucketLimits::new(300, 20),
            Self::Feedbacks => BucketLimits::new(100, 10),
            Self::Analytics
            | Self::Statistics
            | Self::Promotion
            | Self::Chat
            | Self::Supplies
            | Self::Returns
            | Self::Documents
            | Self::Finance
            | Self::Common => BucketLimits::new(60, 10),
        }
    }
}
