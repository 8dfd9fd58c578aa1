//! Data key extraction.
//!
//! A route can declare key expressions. Each expression pulls one value
//! out of the inbound request; the values joined with `/` form the data
//! key that tells apart several stubs recorded for the same route. A
//! missing value stays as an empty segment.
//!
//! Supported expressions:
//! - `query:<name>`: first query parameter value
//! - `header:<name>`: first header value
//! - `json:<pointer>`: JSON pointer into the request body (scalars only)
//! - `<name>`: shorthand for `query:<name>`

use thiserror::Error;

use crate::http::request::InboundRequest;

const KEY_SEPARATOR: &str = "/";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unsupported key expression '{0}'")]
    Unsupported(String),

    #[error("header {name} is not valid text")]
    InvalidHeader { name: String },

    #[error("request body is not JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Resolves key expressions against an inbound request.
pub trait KeyExtractor: Send + Sync {
    /// One entry per expression; missing values are empty strings.
    fn extract(
        &self,
        request: &InboundRequest,
        expressions: &[String],
    ) -> Result<Vec<String>, KeyError>;
}

/// Query, header and JSON body based extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterKeyExtractor;

impl KeyExtractor for ParameterKeyExtractor {
    fn extract(
        &self,
        request: &InboundRequest,
        expressions: &[String],
    ) -> Result<Vec<String>, KeyError> {
        let mut body: Option<serde_json::Value> = None;
        let mut values = Vec::with_capacity(expressions.len());

        for expression in expressions {
            let value = match expression.split_once(':') {
                Some(("query", name)) => query_value(request, name),
                Some(("header", name)) => header_value(request, name)?,
                Some(("json", pointer)) => {
                    if body.is_none() {
                        body = Some(parse_body(request)?);
                    }
                    body.as_ref()
                        .and_then(|json| json.pointer(pointer))
                        .map(scalar_text)
                        .unwrap_or_default()
                }
                Some(_) => return Err(KeyError::Unsupported(expression.clone())),
                None => query_value(request, expression),
            };
            values.push(value);
        }

        Ok(values)
    }
}

/// Join extracted values into a data key.
///
/// Empty values keep their position, so `a=x` and `b=x` under keys `[a, b]`
/// give `x/` and `/x`. When every value is empty the key is empty.
pub fn data_key(values: &[String]) -> String {
    if values.iter().all(String::is_empty) {
        return String::new();
    }
    values.join(KEY_SEPARATOR)
}

fn query_value(request: &InboundRequest, name: &str) -> String {
    request
        .query_pairs()
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

fn header_value(request: &InboundRequest, name: &str) -> Result<String, KeyError> {
    match request.headers.get(name) {
        Some(value) => value
            .to_str()
            .map(str::to_string)
            .map_err(|_| KeyError::InvalidHeader {
                name: name.to_string(),
            }),
        None => Ok(String::new()),
    }
}

fn parse_body(request: &InboundRequest) -> Result<serde_json::Value, KeyError> {
    if request.body.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_slice(&request.body)?)
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
