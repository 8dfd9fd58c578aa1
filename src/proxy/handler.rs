//! Proxy orchestration.
//!
//! # Responsibilities
//! - Resolve the upstream base URL and capturing policy for a route
//! - Rebuild the inbound request for the upstream
//! - Normalize the upstream response
//! - Capture it when the policy says so
//!
//! # Design Decisions
//! - Two sequential steps: network, then persistence. Never concurrent.
//! - A capture failure fails the whole exchange; no partial envelope
//! - Global settings are injected at construction, never read from ambient state

use std::sync::Arc;

use axum::http::Method;

use crate::config::{Api, ProxySettings};
use crate::error::ProxyError;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::proxy::capture::CaptureRecorder;
use crate::proxy::client::{OutboundRequest, UpstreamClient, UpstreamError};
use crate::proxy::normalizer::{normalize, ResponseEnvelope};
use crate::proxy::policy::{compose_url, resolve_base_url, resolve_capturing, route_capturing};

/// Entry point of the proxy-and-capture pipeline.
pub struct ProxyHandler {
    client: Arc<dyn UpstreamClient>,
    recorder: CaptureRecorder,
    settings: ProxySettings,
}

impl ProxyHandler {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        recorder: CaptureRecorder,
        settings: ProxySettings,
    ) -> Self {
        Self {
            client,
            recorder,
            settings,
        }
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Whether any upstream is configured for the route.
    pub fn has_upstream(&self, api: Option<&Api>) -> bool {
        !resolve_base_url(api, &self.settings).is_empty()
    }

    /// Forward `request` upstream and return the normalized response,
    /// capturing it first when capturing is enabled for the route.
    pub async fn perform(
        &self,
        request: &InboundRequest,
        path: &str,
        method: &str,
        data_key: &str,
        api: Option<&Api>,
    ) -> Result<ResponseEnvelope, ProxyError> {
        let base_url = resolve_base_url(api, &self.settings);
        let url = compose_url(base_url, path, request.query.as_deref());

        let outbound = build_outbound(request, method, &url).map_err(|source| ProxyError::Upstream {
            url: url.clone(),
            source,
        })?;

        tracing::info!(url = %url, method = %outbound.method, "Proxy to upstream");

        let raw = self.client.exchange(outbound).await.map_err(|source| {
            metrics::record_upstream_failure();
            tracing::warn!(url = %url, error = %source, "Upstream request failed");
            ProxyError::Upstream {
                url: url.clone(),
                source,
            }
        })?;

        let envelope = normalize(raw);

        if resolve_capturing(route_capturing(api), self.settings.default_capturing) {
            let record = self.recorder.capture(path, method, data_key, &envelope).await?;
            tracing::info!(id = ?record.id, path = %path, method = %method, "Saved a proxy response");
        }

        Ok(envelope)
    }
}

/// Method is the uppercased token; headers and body are copied verbatim.
fn build_outbound(
    request: &InboundRequest,
    method: &str,
    url: &str,
) -> Result<OutboundRequest, UpstreamError> {
    let token = method.to_uppercase();
    let method = Method::from_bytes(token.as_bytes())
        .map_err(|_| UpstreamError::InvalidMethod(method.to_string()))?;

    Ok(OutboundRequest {
        method,
        url: url.to_string(),
        headers: request.headers.clone(),
        body: request.body.clone(),
    })
}
