//! Shared request pipeline for every API module
//!
//! `acquire → send → observe → status mapping → JSON decode`. Each API module
//! wraps one [`BaseApi`] bound to its category.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use wbgate_core::{RateLimiterRegistry, Transport};
use wbgate_domain::{
    ApiRequest, ApiResponse, Category, ClientConfig, HttpMethod, PollingConfig, Result, WbError,
};

/// Fields the platform uses to carry a human-readable error message.
const MESSAGE_FIELDS: [&str; 5] = ["detail", "message", "error", "errorText", "title"];

/// Category-bound handle on the shared transport and rate limiter.
///
/// Cheap to clone; clones share the transport and the limiter.
#[derive(Clone)]
pub struct BaseApi {
    category: Category,
    base_url: String,
    token: Arc<str>,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiterRegistry>,
    polling: PollingConfig,
    max_attempts: u32,
    retry_delay: Duration,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for BaseApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseApi")
            .field("category", &self.category)
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl BaseApi {
    pub fn new(
        category: Category,
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiterRegistry>,
    ) -> Self {
        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", category.resolve_host(config.sandbox)),
        };
        Self {
            category,
            base_url,
            token: Arc::from(config.token.as_str()),
            transport,
            limiter,
            polling: config.polling.clone(),
            max_attempts: config.max_retries.saturating_add(1),
            retry_delay: config.retry_delay(),
            deadline: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limiter(&self) -> &Arc<RateLimiterRegistry> {
        &self.limiter
    }

    /// Polling defaults from the client configuration.
    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    /// Clone whose token waits give up at `deadline` instead of the
    /// limiter's configured maximum wait.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self { deadline: Some(deadline), ..self.clone() }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Request for `endpoint` carrying the seller token.
    pub fn request(&self, method: HttpMethod, endpoint: &str) -> ApiRequest {
        ApiRequest::new(method, self.url(endpoint)).header("Authorization", self.token.as_ref())
    }

    /// Run a rate-governed exchange and map error statuses.
    ///
    /// Connection failures, timeouts and 5xx responses are retried up to
    /// `max_retries` times with exponential backoff. Every attempt takes its
    /// own token and feeds its response back into the limiter.
    ///
    /// # Errors
    /// - `WbError::RateLimitExceeded` when no token was granted in time or the
    ///   server answered 429
    /// - `WbError::Transport` when no response was received
    /// - the status class error for any other non-2xx response
    #[instrument(skip(self, request), fields(category = %self.category, method = %request.method, url = %request.url))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let admitted = self.limiter.acquire(self.category, self.deadline).await?;
            debug!(
                attempt,
                waited_ms = admitted.waited.as_millis() as u64,
                remaining = admitted.remaining,
                "request admitted"
            );

            let retryable = match self.transport.send(request.clone()).await {
                Ok(response) => {
                    self.limiter.observe(self.category, &response)?;
                    if !response.is_server_error() || attempt >= attempts {
                        check_status(&response)?;
                        return Ok(response);
                    }
                    WbError::Server { status: response.status, message: error_message(&response) }
                }
                Err(err) if attempt < attempts && err.is_retryable() => WbError::Transport(err),
                Err(err) => return Err(err.into()),
            };

            let delay = backoff_delay(self.retry_delay, attempt);
            debug!(attempt, error = %retryable, delay_ms = delay.as_millis() as u64, "retrying request");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// GET `endpoint` and decode the JSON body.
    ///
    /// # Errors
    /// See [`BaseApi::send`]; `WbError::Decode` when the body does not match
    /// `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.request(HttpMethod::Get, endpoint);
        for (name, value) in query {
            request = request.query(*name, value);
        }
        self.send(request).await?.json()
    }

    /// POST a JSON body to `endpoint` and decode the JSON response.
    ///
    /// # Errors
    /// See [`BaseApi::get`]; `WbError::Validation` when `body` cannot be
    /// serialized.
    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| WbError::Validation(format!("failed to serialize request body: {e}")))?;
        let request = self.request(HttpMethod::Post, endpoint).json(body);
        self.send(request).await?.json()
    }
}

/// `base`, doubled for every retry after the first.
fn backoff_delay(base: Duration, retry_number: u32) -> Duration {
    let shift = retry_number.saturating_sub(1).min(8);
    base.saturating_mul(1u32 << shift)
}

/// Map a non-2xx status to its error class. 429 never reaches this point
/// because the limiter turns it into `RateLimitExceeded` first.
pub(crate) fn check_status(response: &ApiResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let message = error_message(response);
    warn!(status = response.status, message = %message, "API returned error status");

    Err(match response.status {
        400 => WbError::Validation(message),
        401 => WbError::Auth(message),
        403 => WbError::Forbidden(message),
        404 => WbError::NotFound(message),
        status @ 500..=599 => WbError::Server { status, message },
        status => WbError::Http { status, message },
    })
}

fn error_message(response: &ApiResponse) -> String {
    let text = response.text();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
        return if text.trim().is_empty() { format!("HTTP {}", response.status) } else { text };
    };

    MESSAGE_FIELDS
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(|field| match field {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| value.to_string())
}

/// Standard `{ data, error, errorText }` envelope used by most endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_text: String,
}

impl<T> Envelope<T> {
    /// Payload, or a validation error when the envelope flags one.
    pub fn into_data(self) -> Result<Option<T>> {
        if self.error {
            let text = if self.error_text.is_empty() { "request rejected".into() } else { self.error_text };
            return Err(WbError::Validation(text));
        }
        Ok(self.data)
    }
}
