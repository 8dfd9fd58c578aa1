//! Response normalization.
//!
//! The upstream body is already fully buffered, so a `Transfer-Encoding`
//! header no longer describes it. The header is dropped and the body is
//! marked as streamed, which leaves framing to the serving connection.

use axum::http::header::TRANSFER_ENCODING;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

use crate::proxy::client::UpstreamResponse;

/// How the body should be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Sent as a single sized payload.
    Buffered(Bytes),
    /// Sent as a stream; the transport picks its own framing.
    Streamed(Bytes),
}

impl ResponseBody {
    pub fn bytes(&self) -> &Bytes {
        match self {
            ResponseBody::Buffered(bytes) | ResponseBody::Streamed(bytes) => bytes,
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, ResponseBody::Streamed(_))
    }
}

/// The response handed back to the web layer.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

pub fn normalize(raw: UpstreamResponse) -> ResponseEnvelope {
    let UpstreamResponse {
        status,
        mut headers,
        body,
    } = raw;

    let body = if headers.remove(TRANSFER_ENCODING).is_some() {
        ResponseBody::Streamed(body)
    } else {
        ResponseBody::Buffered(body)
    };

    ResponseEnvelope {
        status,
        headers,
        body,
    }
}
