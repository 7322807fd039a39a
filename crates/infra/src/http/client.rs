use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;
use wbgate_core::Transport;
use wbgate_domain::constants::USER_AGENT;
use wbgate_domain::{
    ApiRequest, ApiResponse, ClientConfig, HttpMethod, ResponseHeaders, TransportError, WbError,
};

use crate::errors::InfraError;

/// reqwest-backed [`Transport`] with a per-request timeout.
///
/// Every call is a single exchange. Retries belong to the caller so that each
/// attempt passes through the rate limiter; 429 and 5xx responses are handed
/// back untouched.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, WbError> {
        Self::builder().build()
    }

    /// Transport with the configured request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, WbError> {
        Self::builder().timeout(config.timeout()).user_agent(USER_AGENT).build()
    }

    fn request_builder(&self, request: &ApiRequest) -> RequestBuilder {
        let mut builder = self.client.request(to_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = request.method;
        let url = request.url.as_str();
        debug!(%method, %url, "sending HTTP request");

        match self.request_builder(&request).send().await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                into_api_response(response).await
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(InfraError::from(err).into())
            }
        }
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpTransport, WbError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| WbError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpTransport { client })
    }
}

async fn into_api_response(response: Response) -> Result<ApiResponse, TransportError> {
    let status = response.status().as_u16();
    let headers: ResponseHeaders = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect();
    let body = response.bytes().await.map_err(InfraError::from)?;

    Ok(ApiResponse { status, headers, body: body.to_vec() })
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_with_defaults() -> HttpTransport {
        HttpTransport::builder().timeout(Duration::from_secs(5)).build().expect("http transport")
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Ratelimit-Remaining", "7")
                    .set_body_string("ok"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_with_defaults();
        let response = transport
            .send(ApiRequest::new(HttpMethod::Get, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-ratelimit-remaining"), Some("7"));
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn forwards_headers_query_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/upload/task"))
            .and(header("Authorization", "token-1"))
            .and(query_param("limit", "10"))
            .and(body_json(json!({"data": [{"nmID": 1, "price": 100}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 5}})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::new(HttpMethod::Post, format!("{}/api/v2/upload/task", server.uri()))
            .header("Authorization", "token-1")
            .query("limit", 10)
            .json(json!({"data": [{"nmID": 1, "price": 100}]}));
        let response = transport_with_defaults().send(request).await.expect("response");

        let body: serde_json::Value = response.json().expect("json body");
        assert_eq!(body["data"]["id"], 5);
    }

    #[tokio::test]
    async fn server_errors_are_returned_after_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("X-Ratelimit-Remaining", "4"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_with_defaults()
            .send(ApiRequest::new(HttpMethod::Get, server.uri()))
            .await
            .expect("response");
        assert_eq!(response.status, 503);
        assert_eq!(response.headers.get("x-ratelimit-remaining"), Some("4"));
    }

    #[tokio::test]
    async fn does_not_retry_rate_limit_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("X-Ratelimit-Retry", "2"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_with_defaults()
            .send(ApiRequest::new(HttpMethod::Get, server.uri()))
            .await
            .expect("response");

        assert!(response.is_rate_limited());
        assert_eq!(response.headers.get("x-ratelimit-retry"), Some("2"));
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_with_defaults()
            .send(ApiRequest::new(HttpMethod::Get, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status, 404);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn network_failure_maps_to_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{}", addr);

        let result = transport_with_defaults().send(ApiRequest::new(HttpMethod::Get, url)).await;
        match result {
            Err(err @ TransportError::Connect(_)) => assert!(err.is_retryable()),
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[test]
    fn config_sets_user_agent_and_timeout() {
        let mut config = ClientConfig::new("token");
        config.timeout_secs = 3;
        assert!(HttpTransport::from_config(&config).is_ok());
    }
}
