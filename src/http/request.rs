//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Enforce the body size limit
//! - Buffer the request into an owned, replayable value
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Declared Content-Length checked before the body is read
//! - Body kept as raw bytes; it may be replayed upstream verbatim

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Owned snapshot of an inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Buffer `request`, rejecting bodies larger than `limit` bytes.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, AppError> {
        let (parts, body) = request.into_parts();

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if matches!(declared, Some(len) if len > limit) {
            return Err(AppError::PayloadTooLarge);
        }

        // Without a declared length, hitting the limit is the only read failure
        // a fully received body can produce.
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| match declared {
            None => AppError::PayloadTooLarge,
            Some(_) => AppError::BadRequest(format!("failed to read request body: {}", e)),
        })?;

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Decoded query parameters in order of appearance.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match &self.query {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-trace", "t-1")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_from_request_buffers_everything() {
        let inbound = InboundRequest::from_request(build("/orders?status=open&q=a%20b", "payload"), 1024)
            .await
            .unwrap();

        assert_eq!(inbound.method, Method::POST);
        assert_eq!(inbound.path, "/orders");
        assert_eq!(inbound.query.as_deref(), Some("status=open&q=a%20b"));
        assert_eq!(inbound.headers.get("x-trace").unwrap(), "t-1");
        assert_eq!(inbound.body, Bytes::from_static(b"payload"));
        assert_eq!(
            inbound.query_pairs(),
            vec![
                ("status".to_string(), "open".to_string()),
                ("q".to_string(), "a b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_query() {
        let inbound = InboundRequest::from_request(build("/orders", ""), 1024)
            .await
            .unwrap();
        assert!(inbound.query.is_none());
        assert!(inbound.query_pairs().is_empty());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let err = InboundRequest::from_request(build("/orders", "0123456789"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge));

        let declared = Request::builder()
            .uri("/orders")
            .header(CONTENT_LENGTH, "100")
            .body(Body::empty())
            .unwrap();
        let err = InboundRequest::from_request(declared, 10).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let request = Request::new(());
        let mut maker = MakeRequestUuidV4;
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert_eq!(a.header_value().len(), 36);
    }
}
