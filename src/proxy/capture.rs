//! Capture recorder.
//!
//! Turns a normalized upstream response into a capture record and hands it
//! to the store. Headers are kept as a text block of `Name: value` lines
//! joined by CRLF; one line per value, in header-map iteration order.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{EncodingError, ProxyError};
use crate::http::download::extract_download_file_name;
use crate::observability::metrics;
use crate::proxy::normalizer::ResponseEnvelope;
use crate::store::{ApiResponse, CaptureStore, Payload};

const HEADER_SEPARATOR: &str = "\r\n";
const HEADER_KEY_VALUE_SEPARATOR: &str = ":";

/// Persists observed upstream responses.
#[derive(Clone)]
pub struct CaptureRecorder {
    store: Arc<dyn CaptureStore>,
}

impl CaptureRecorder {
    pub fn new(store: Arc<dyn CaptureStore>) -> Self {
        Self { store }
    }

    /// Build a record from `response` and create it in the store.
    pub async fn capture(
        &self,
        path: &str,
        method: &str,
        data_key: &str,
        response: &ResponseEnvelope,
    ) -> Result<ApiResponse, ProxyError> {
        let record = build_record(path, method, data_key, response)?;

        match self.store.create(record).await {
            Ok(saved) => {
                metrics::record_capture("saved");
                Ok(saved)
            }
            Err(source) => {
                metrics::record_capture("failed");
                Err(ProxyError::Persistence {
                    path: path.to_string(),
                    method: method.to_string(),
                    source,
                })
            }
        }
    }
}

/// A file-bearing response becomes an attachment, anything else an inline body.
pub fn build_record(
    path: &str,
    method: &str,
    data_key: &str,
    response: &ResponseEnvelope,
) -> Result<ApiResponse, EncodingError> {
    let header = serialize_headers(&response.headers)?;
    let body = response.body.bytes().to_vec();

    let payload = match extract_download_file_name(&response.headers)? {
        Some(file_name) => Payload::Attachment {
            file_name,
            content: body,
        },
        None => Payload::Inline { body },
    };

    Ok(ApiResponse {
        id: None,
        path: path.to_string(),
        method: method.to_string(),
        data_key: data_key.to_string(),
        status_code: response.status.as_u16(),
        header,
        description: String::new(),
        payload,
    })
}

/// Serialize every header value as its own `Name: value` line.
pub fn serialize_headers(headers: &HeaderMap) -> Result<String, EncodingError> {
    let mut lines = Vec::with_capacity(headers.len());
    for name in headers.keys() {
        let display = canonical_name(name);
        for value in headers.get_all(name) {
            let text = std::str::from_utf8(value.as_bytes()).map_err(|e| {
                EncodingError::new(format!("value of header {}", display), e.to_string())
            })?;
            lines.push(format!("{}{} {}", display, HEADER_KEY_VALUE_SEPARATOR, text));
        }
    }
    Ok(lines.join(HEADER_SEPARATOR))
}

/// Parse a header block back into a header map. Blank lines are skipped,
/// bare `\n` line breaks are accepted.
pub fn parse_header_block(block: &str) -> Result<HeaderMap, EncodingError> {
    let mut headers = HeaderMap::new();
    for line in block.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (name, value) = line
            .split_once(HEADER_KEY_VALUE_SEPARATOR)
            .ok_or_else(|| EncodingError::new("header line", format!("'{}' has no ':'", line)))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| EncodingError::new(format!("header name '{}'", name.trim()), e.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| EncodingError::new(format!("value of header {}", name), e.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// `content-type` → `Content-Type`.
pub fn canonical_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::normalizer::ResponseBody;
    use crate::store::{MemoryStore, StoreError};
    use axum::http::header::CONTENT_DISPOSITION;
    use axum::http::StatusCode;
    use bytes::Bytes;

    fn envelope(headers: HeaderMap, body: &'static [u8]) -> ResponseEnvelope {
        ResponseEnvelope {
            status: StatusCode::OK,
            headers,
            body: ResponseBody::Buffered(Bytes::from_static(body)),
        }
    }

    #[test]
    fn test_serialize_headers_one_line_per_value() {
        let mut headers = HeaderMap::new();
        headers.append("x-a", HeaderValue::from_static("1"));
        headers.append("x-a", HeaderValue::from_static("2"));
        headers.append("x-b", HeaderValue::from_static("3"));

        assert_eq!(
            serialize_headers(&headers).unwrap(),
            "X-A: 1\r\nX-A: 2\r\nX-B: 3"
        );
        assert_eq!(serialize_headers(&HeaderMap::new()).unwrap(), "");
    }

    #[test]
    fn test_serialize_rejects_non_utf8_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-raw", HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        assert!(serialize_headers(&headers).is_err());
    }

    #[test]
    fn test_parse_header_block() {
        let headers =
            parse_header_block("Content-Type: application/json\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\n\n")
                .unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        let cookies: Vec<_> = headers.get_all("set-cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);

        assert!(parse_header_block("not a header").is_err());
        assert!(parse_header_block("").unwrap().is_empty());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(&HeaderName::from_static("content-type")), "Content-Type");
        assert_eq!(canonical_name(&HeaderName::from_static("etag")), "Etag");
        assert_eq!(canonical_name(&HeaderName::from_static("x-request-id")), "X-Request-Id");
    }

    #[test]
    fn test_inline_record() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let record = build_record("/orders", "GET", "open", &envelope(headers, b"{\"id\":1}")).unwrap();
        assert_eq!(record.status_code, 200);
        assert_eq!(record.header, "Content-Type: application/json");
        assert_eq!(
            record.payload,
            Payload::Inline {
                body: b"{\"id\":1}".to_vec()
            }
        );
    }

    #[test]
    fn test_attachment_record() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"report.pdf\""),
        );

        let record = build_record("/report", "GET", "", &envelope(headers, b"%PDF-1.7")).unwrap();
        assert_eq!(
            record.payload,
            Payload::Attachment {
                file_name: "report.pdf".to_string(),
                content: b"%PDF-1.7".to_vec(),
            }
        );
    }

    #[tokio::test]
    async fn test_capture_persists_record() {
        let store = Arc::new(MemoryStore::new());
        let recorder = CaptureRecorder::new(store.clone());

        let saved = recorder
            .capture("/orders", "GET", "", &envelope(HeaderMap::new(), b"[]"))
            .await
            .unwrap();
        assert_eq!(saved.id, Some(1));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_capture_conflict_is_persistence_error() {
        let store = Arc::new(MemoryStore::new());
        let recorder = CaptureRecorder::new(store.clone());
        let response = envelope(HeaderMap::new(), b"[]");

        recorder.capture("/orders", "GET", "", &response).await.unwrap();
        let err = recorder.capture("/orders", "GET", "", &response).await.unwrap_err();

        match err {
            ProxyError::Persistence { path, method, source } => {
                assert_eq!(path, "/orders");
                assert_eq!(method, "GET");
                assert!(matches!(source, StoreError::Conflict { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.len(), 1);
    }
}
