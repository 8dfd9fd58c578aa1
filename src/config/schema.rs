//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the stub server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the stub server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StubConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Global proxy settings, fixed for the lifetime of the process.
    pub proxy: ProxySettings,

    /// Upstream HTTP client settings.
    pub upstream: UpstreamConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Capture storage settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Management API settings.
    pub admin: AdminConfig,

    pub security: SecurityConfig,

    /// Stubbed route definitions.
    pub apis: Vec<Api>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Process-wide proxy defaults.
///
/// Loaded once at startup and passed by reference into the proxy handler;
/// a config reload never changes them.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProxySettings {
    /// Base URL used when a route has no override. Empty disables proxying.
    pub default_url: String,

    /// Whether proxied responses are captured when a route does not say.
    pub default_capturing: bool,
}

/// A stubbed route, identified by `(path, method)`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Api {
    /// Request path (exact match).
    pub path: String,

    /// HTTP method token, matched case-insensitively.
    pub method: String,

    #[serde(default)]
    pub description: String,

    /// Key expressions handed to the key extractor to build the data key.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Per-route proxy override.
    #[serde(default)]
    pub proxy: Option<ApiProxy>,
}

/// Per-route proxy override.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ApiProxy {
    /// Upstream base URL. Empty means "use the global default".
    #[serde(default)]
    pub url: String,

    /// Capturing flag. Unset means "use the global default".
    #[serde(default)]
    pub capturing: Option<bool>,
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total upstream exchange timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum idle pooled connections per upstream host.
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            pool_max_idle_per_host: 32,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Capture storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot file. When unset, captures live in memory only.
    pub snapshot_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the management API.
    pub enabled: bool,

    /// Path prefix the management API is mounted under.
    pub path_prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/_admin".to_string(),
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}
