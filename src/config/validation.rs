//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, bind addresses and value ranges
//! - Detect duplicate routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StubConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;

use crate::config::schema::StubConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &StubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    check_base_url(&mut errors, "proxy.default_url", &config.proxy.default_url);

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be greater than zero",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.admin.enabled {
        let prefix = &config.admin.path_prefix;
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new("admin.path_prefix", "must start with '/'"));
        } else if prefix.len() == 1 || prefix.ends_with('/') {
            errors.push(ValidationError::new(
                "admin.path_prefix",
                "must name a path segment and not end with '/'",
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, api) in config.apis.iter().enumerate() {
        let field = format!("apis[{}]", i);

        if !api.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.path", field),
                format!("'{}' must start with '/'", api.path),
            ));
        }

        let method = api.method.to_uppercase();
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.method", field),
                format!("'{}' is not a valid method token", api.method),
            ));
        }

        if !seen.insert((api.path.clone(), method.clone())) {
            errors.push(ValidationError::new(
                field.clone(),
                format!("duplicate route {} {}", method, api.path),
            ));
        }

        if let Some(proxy) = &api.proxy {
            check_base_url(&mut errors, &format!("{}.proxy.url", field), &proxy.url);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An empty base URL is allowed (it means "not set").
fn check_base_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{}': {}", value, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Api, ApiProxy};

    fn api(path: &str, method: &str) -> Api {
        Api {
            path: path.to_string(),
            method: method.to_string(),
            description: String::new(),
            keys: Vec::new(),
            proxy: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&StubConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_routes_ignore_method_case() {
        let mut config = StubConfig::default();
        config.apis.push(api("/orders", "get"));
        config.apis.push(api("/orders", "GET"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate route GET /orders"));
    }

    #[test]
    fn test_bad_override_url() {
        let mut config = StubConfig::default();
        let mut route = api("/orders", "GET");
        route.proxy = Some(ApiProxy {
            url: "ftp://files.test".to_string(),
            capturing: None,
        });
        config.apis.push(route);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "apis[0].proxy.url");
    }

    #[test]
    fn test_empty_override_url_is_allowed() {
        let mut config = StubConfig::default();
        let mut route = api("/orders", "GET");
        route.proxy = Some(ApiProxy::default());
        config.apis.push(route);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_body_limit() {
        let mut config = StubConfig::default();
        config.security.max_body_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "security.max_body_size");
    }

    #[test]
    fn test_admin_prefix_shape() {
        for prefix in ["admin", "/", "/_admin/"] {
            let mut config = StubConfig::default();
            config.admin.path_prefix = prefix.to_string();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors[0].field, "admin.path_prefix", "prefix {prefix}");
        }

        let mut config = StubConfig::default();
        config.admin.enabled = false;
        config.admin.path_prefix = "/".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
