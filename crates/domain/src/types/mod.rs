//! Domain types and models

pub mod category;
pub mod http;
pub mod task;

pub use category::{BucketLimits, Category};
pub use http::{ApiRequest, ApiResponse, HttpMethod, ResponseHeaders};
pub use task::{TaskHandle, TaskId, TaskProgress, TaskReport, TaskStatus};
