//! Port interfaces for outbound calls

use std::sync::Arc;

use async_trait::async_trait;
use wbgate_domain::{ApiRequest, ApiResponse, TransportError};

/// Trait for sending one request to the platform.
///
/// Implementations report failures that happened before any HTTP status was
/// received as `TransportError`; every status code, including 429 and 5xx,
/// comes back as an `ApiResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request).await
    }
}
