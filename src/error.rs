//! Error taxonomy shared by the proxy core and the web layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::key::KeyError;
use crate::proxy::client::UpstreamError;
use crate::store::StoreError;

/// Header or filename text that cannot be represented in the assumed charset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot encode {what}: {detail}")]
pub struct EncodingError {
    pub what: String,
    pub detail: String,
}

impl EncodingError {
    pub fn new(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

/// Failure of a single proxy exchange.
///
/// Upstream and persistence failures are kept apart so a caller can tell
/// "origin unreachable" from "origin answered but the capture was lost".
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("failed to capture response of {method} {path}: {source}")]
    Persistence {
        path: String,
        method: String,
        #[source]
        source: StoreError,
    },
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no stub for {method} {path}")]
    NoStub { method: String, path: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("cannot compute data key: {0}")]
    Key(#[from] KeyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::NoStub { .. } => (StatusCode::NOT_FOUND, "not_found_error", "no_stub"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", "data_not_found"),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "invalid_request_error",
                "payload_too_large",
            ),
            AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", "bad_request")
            }
            AppError::Key(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", "invalid_key"),
            AppError::Proxy(ProxyError::Upstream { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_error", "upstream_failed")
            }
            AppError::Proxy(ProxyError::Encoding(_)) | AppError::Encoding(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "encoding_error", "encoding_failed")
            }
            AppError::Proxy(ProxyError::Persistence { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "capture_failed")
            }
            AppError::Store(StoreError::Conflict { .. }) => {
                (StatusCode::CONFLICT, "conflict_error", "data_already_exists")
            }
            AppError::Store(StoreError::NotFound { .. })
            | AppError::Store(StoreError::HistoryNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found_error", "data_not_found")
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage_failed"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
