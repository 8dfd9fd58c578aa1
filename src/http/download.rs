//! `Content-Disposition` handling for binary payloads.
//!
//! Captured responses that name a file are stored as attachments, and
//! attachments are served back with a disposition header that survives
//! non-ASCII file names (`filename` fallback plus RFC 5987 `filename*`).

use std::borrow::Cow;

use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderMap, HeaderValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::EncodingError;

/// RFC 5987 `attr-char`: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Derive the download file name announced by a `Content-Disposition` header.
///
/// `filename*` wins over `filename`. Directory components are dropped.
/// Returns `Ok(None)` when there is no header or it names no file.
pub fn extract_download_file_name(headers: &HeaderMap) -> Result<Option<String>, EncodingError> {
    let Some(value) = headers.get(CONTENT_DISPOSITION) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(value.as_bytes())
        .map_err(|e| EncodingError::new("Content-Disposition header", e.to_string()))?;

    let mut plain = None;
    let mut extended = None;
    for param in split_params(text).into_iter().skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(unquote(value.trim())),
            "filename*" => extended = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let name = match (extended, plain) {
        (Some(ext), _) => decode_ext_value(&ext)?,
        (None, Some(plain)) => plain.into_owned(),
        (None, None) => return Ok(None),
    };

    let base = base_name(&name);
    Ok((!base.is_empty()).then(|| base.to_string()))
}

/// Set an attachment `Content-Disposition` for `file_name` on `headers`.
pub fn add_content_disposition(headers: &mut HeaderMap, file_name: &str) -> Result<(), EncodingError> {
    if file_name.is_empty() {
        return Err(EncodingError::new("file name", "file name is empty"));
    }
    if file_name.chars().any(char::is_control) {
        return Err(EncodingError::new(
            "file name",
            format!("'{}' contains control characters", file_name.escape_debug()),
        ));
    }

    let mut fallback = String::with_capacity(file_name.len());
    for c in file_name.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            c if c.is_ascii() => fallback.push(c),
            _ => fallback.push('_'),
        }
    }
    let encoded = utf8_percent_encode(file_name, ATTR_CHAR);

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    );
    let value = HeaderValue::from_str(&value)
        .map_err(|e| EncodingError::new("Content-Disposition header", e.to_string()))?;
    headers.insert(CONTENT_DISPOSITION, value);
    Ok(())
}

/// Split on `;` outside quoted strings.
fn split_params(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn unquote(value: &str) -> Cow<'_, str> {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return Cow::Borrowed(value);
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Decode an RFC 5987 `charset'language'value` parameter.
fn decode_ext_value(value: &str) -> Result<String, EncodingError> {
    let mut parts = value.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(EncodingError::new(
            "filename* parameter",
            format!("'{}' is not an extended value", value),
        ));
    };

    let bytes: Vec<u8> = percent_decode_str(encoded).collect();
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).map_err(|e| EncodingError::new("filename* parameter", e.to_string()))
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Ok(bytes.into_iter().map(char::from).collect())
    } else {
        Err(EncodingError::new(
            "filename* parameter",
            format!("unsupported charset '{}'", charset),
        ))
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}
