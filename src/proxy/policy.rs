//! Upstream URL and capturing policy resolution.

use crate::config::{Api, ProxySettings};

/// Pick the upstream base URL: a non-empty route override, else the global default.
pub fn resolve_base_url<'a>(api: Option<&'a Api>, settings: &'a ProxySettings) -> &'a str {
    api.and_then(|api| api.proxy.as_ref())
        .map(|proxy| proxy.url.as_str())
        .filter(|url| !url.is_empty())
        .unwrap_or(&settings.default_url)
}

/// The route's explicit capturing flag, if it sets one.
pub fn route_capturing(api: Option<&Api>) -> Option<bool> {
    api.and_then(|api| api.proxy.as_ref())
        .and_then(|proxy| proxy.capturing)
}

/// An explicit override always wins; otherwise the default applies.
pub fn resolve_capturing(route_override: Option<bool>, default: bool) -> bool {
    match route_override {
        Some(explicit) => explicit,
        None => default,
    }
}

/// `base + path`, plus `?query` when the inbound query string is non-empty.
pub fn compose_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}{}?{}", base_url, path, query),
        None => format!("{}{}", base_url, path),
    }
}
