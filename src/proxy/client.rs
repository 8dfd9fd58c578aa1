//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Execute one outbound request against the resolved upstream URL
//! - Return status, headers and the fully buffered body
//!
//! # Design Decisions
//! - No retries: a failed exchange propagates immediately
//! - Timeouts live in the client configuration, not in the proxy handler
//! - Redirects are relayed to the caller, never followed

use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// Request rebuilt from an inbound request, ready to send upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Raw upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid method token '{0}'")]
    InvalidMethod(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Performs the single blocking network call of a proxy exchange.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn exchange(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError>;
}

/// `reqwest`-backed upstream client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn exchange(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = Url::parse(&request.url)?;

        // Framing and authority headers are derived from the new URL and body.
        let mut headers = request.headers;
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);
        headers.remove(TRANSFER_ENCODING);
        headers.remove(CONNECTION);

        let response = self
            .client
            .request(request.method, url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::debug!(status = %status, bytes = body.len(), "Upstream responded");
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exchange_forwards_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/items/7"))
            .and(header("x-trace", "abc"))
            .and(body_bytes(b"\x00\x01payload".to_vec()))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-upstream", "yes")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-trace", "abc".parse().unwrap());
        headers.insert(HOST, "stub.local".parse().unwrap());

        let client = HttpUpstream::new(&UpstreamConfig::default()).unwrap();
        let response = client
            .exchange(OutboundRequest {
                method: Method::PUT,
                url: format!("{}/items/7", server.uri()),
                headers,
                body: Bytes::from_static(b"\x00\x01payload"),
            })
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers.get("x-upstream").unwrap(), "yes");
        assert_eq!(response.body, Bytes::from_static(b"created"));
    }

    #[tokio::test]
    async fn test_error_statuses_are_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = HttpUpstream::new(&UpstreamConfig::default()).unwrap();
        let response = client
            .exchange(OutboundRequest {
                method: Method::GET,
                url: server.uri(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = HttpUpstream::new(&UpstreamConfig::default()).unwrap();
        let err = client
            .exchange(OutboundRequest {
                method: Method::GET,
                url: "/orders".to_string(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl(_)));
    }
}
