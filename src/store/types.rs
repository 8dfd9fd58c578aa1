//! Capture record model and storage errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage-assigned record identifier.
pub type RecordId = u64;

/// Identifier of a history entry within one record.
pub type SubId = u64;

/// Response payload of a capture record.
///
/// A record carries either an inline body or a named attachment, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Inline { body: Vec<u8> },
    Attachment { file_name: String, content: Vec<u8> },
}

impl Payload {
    /// Raw payload bytes, whichever representation holds them.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Inline { body } => body,
            Payload::Attachment { content, .. } => content,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            Payload::Inline { .. } => None,
            Payload::Attachment { file_name, .. } => Some(file_name),
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Payload::Attachment { .. })
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Inline { body: Vec::new() }
    }
}

/// A captured or hand-authored response for one `(path, method, data_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Assigned by the store on create.
    pub id: Option<RecordId>,
    pub path: String,
    pub method: String,
    /// Disambiguates several stubs on the same route.
    pub data_key: String,
    pub status_code: u16,
    /// Serialized header block, `Name: value` lines joined by CRLF.
    pub header: String,
    #[serde(default)]
    pub description: String,
    pub payload: Payload,
}

impl ApiResponse {
    /// Uniqueness key of the record. The method is compared case-insensitively.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.path, &self.method, &self.data_key)
    }
}

/// The `(path, method, data_key)` triplet that must be unique across records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub path: String,
    pub method: String,
    pub data_key: String,
}

impl RecordKey {
    pub fn new(path: &str, method: &str, data_key: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_uppercase(),
            data_key: data_key.to_string(),
        }
    }
}

/// An immutable snapshot of a previous version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: RecordId,
    pub sub_id: SubId,
    /// Seconds since the Unix epoch.
    pub saved_at: u64,
    pub record: ApiResponse,
}

/// Search criteria for listing records. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseFilter {
    /// Path prefix.
    pub path: Option<String>,
    /// Exact method, case-insensitive.
    pub method: Option<String>,
    /// Substring of the description.
    pub description: Option<String>,
}

impl ResponseFilter {
    pub fn matches(&self, record: &ApiResponse) -> bool {
        let path = self
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map_or(true, |p| record.path.starts_with(p));
        let method = self
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or(true, |m| record.method.eq_ignore_ascii_case(m));
        let description = self
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map_or(true, |d| record.description.contains(d));
        path && method && description
    }
}

/// Errors raised by a capture store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("response for {method} {path} (data key '{data_key}') already exists")]
    Conflict {
        path: String,
        method: String,
        data_key: String,
    },

    #[error("response {id} not found")]
    NotFound { id: RecordId },

    #[error("history {sub_id} of response {id} not found")]
    HistoryNotFound { id: RecordId, sub_id: SubId },

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn conflict(key: &RecordKey) -> Self {
        StoreError::Conflict {
            path: key.path.clone(),
            method: key.method.clone(),
            data_key: key.data_key.clone(),
        }
    }
}
