//! Endpoint modules for the seller API
//!
//! Every module wraps a [`BaseApi`] bound to its category, so each call is
//! admitted by the client's rate limiter and feeds the response's throttling
//! headers back into it.

pub mod base;
pub mod common;
pub mod prices;
pub mod reports;
pub mod tasks;

pub use base::BaseApi;
pub use common::{CommonApi, PingResponse, SellerInfo};
pub use prices::{ClubDiscount, Price, PriceTaskDetails, PricesApi, SizePrice, UploadTask};
pub use reports::{ReportKind, ReportTaskStatus, ReportsApi};
pub use tasks::WaitOptions;
