//! Response rendering.
//!
//! # Responsibilities
//! - Turn a proxied `ResponseEnvelope` into an axum response
//! - Turn a stored capture record into a stub response
//!
//! # Design Decisions
//! - Framing headers (`Content-Length`, `Transfer-Encoding`) are derived from
//!   the body hyper is given. The one exception is an empty HEAD answer, which
//!   keeps the `Content-Length` of the body it omits
//! - A streamed envelope is handed over as a body stream without a size hint
//! - Attachments always leave with a `Content-Disposition`

use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;

use crate::error::AppError;
use crate::http::download::add_content_disposition;
use crate::proxy::capture::parse_header_block;
use crate::proxy::normalizer::{ResponseBody, ResponseEnvelope};
use crate::store::{ApiResponse, Payload};

impl ResponseEnvelope {
    /// Render the envelope as the answer to a request with `method`.
    pub fn respond(self, method: &str) -> Response {
        let ResponseEnvelope {
            status,
            mut headers,
            body,
        } = self;

        let body = match body {
            ResponseBody::Buffered(bytes) => {
                strip_length(&mut headers, bytes.len(), method);
                Body::from(bytes)
            }
            ResponseBody::Streamed(bytes) => {
                headers.remove(CONTENT_LENGTH);
                Body::from_stream(stream::once(async move { Ok::<_, Infallible>(bytes) }))
            }
        };

        (status, headers, body).into_response()
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        self.respond("GET")
    }
}

fn strip_length(headers: &mut HeaderMap, body_len: usize, method: &str) {
    if !(body_len == 0 && method.eq_ignore_ascii_case("HEAD")) {
        headers.remove(CONTENT_LENGTH);
    }
}

/// Build the response served for a stored capture record.
pub fn render_stub(record: &ApiResponse, method: &str) -> Result<Response, AppError> {
    let status = StatusCode::from_u16(record.status_code).map_err(|_| {
        AppError::BadRequest(format!("stored status code {} is invalid", record.status_code))
    })?;

    let mut headers = parse_header_block(&record.header)?;
    headers.remove(TRANSFER_ENCODING);

    let body = match &record.payload {
        Payload::Inline { body } => body.clone(),
        Payload::Attachment { file_name, content } => {
            if !headers.contains_key(CONTENT_DISPOSITION) {
                add_content_disposition(&mut headers, file_name)?;
            }
            content.clone()
        }
    };
    if !body.is_empty() {
        headers.remove(CONTENT_LENGTH);
    }

    Ok((status, headers, Body::from(body)).into_response())
}
