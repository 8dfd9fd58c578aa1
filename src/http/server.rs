//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: management API plus the catch-all stub handler
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve stored stubs, proxy the rest, 404 when neither applies
//! - Swap the route table when the config file changes
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::admin_routes;
use crate::config::StubConfig;
use crate::error::AppError;
use crate::http::request::{InboundRequest, MakeRequestUuidV4};
use crate::http::response::render_stub;
use crate::key::{self, KeyExtractor, ParameterKeyExtractor};
use crate::observability::metrics;
use crate::proxy::{CaptureRecorder, HttpUpstream, ProxyHandler, UpstreamClient, UpstreamError};
use crate::routing::{RouteSource, RouteTable};
use crate::store::{CaptureStore, MemoryStore, RecordKey, StoreError};

const SOURCE_STUB: &str = "stub";
const SOURCE_PROXY: &str = "proxy";
const SOURCE_NONE: &str = "none";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub store: Arc<dyn CaptureStore>,
    pub proxy: Arc<ProxyHandler>,
    pub keys: Arc<dyn KeyExtractor>,
    pub max_body_size: usize,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to open capture store: {0}")]
    Store(#[from] StoreError),
}

/// HTTP server for the stub.
pub struct HttpServer {
    router: Router,
    routes: Arc<ArcSwap<RouteTable>>,
    config: StubConfig,
}

impl HttpServer {
    /// Create a server with the reqwest upstream client and the configured store.
    pub fn new(config: StubConfig) -> Result<Self, ServerError> {
        let upstream: Arc<dyn UpstreamClient> = Arc::new(HttpUpstream::new(&config.upstream)?);
        let store: Arc<dyn CaptureStore> = match &config.storage.snapshot_path {
            Some(path) => Arc::new(MemoryStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_components(config, upstream, store))
    }

    /// Create a server around caller-provided collaborators.
    pub fn with_components(
        config: StubConfig,
        upstream: Arc<dyn UpstreamClient>,
        store: Arc<dyn CaptureStore>,
    ) -> Self {
        let routes = Arc::new(ArcSwap::from_pointee(RouteTable::from_config(&config.apis)));
        let proxy = ProxyHandler::new(
            upstream,
            CaptureRecorder::new(store.clone()),
            config.proxy.clone(),
        );

        let state = AppState {
            routes: routes.clone(),
            store,
            proxy: Arc::new(proxy),
            keys: Arc::new(ParameterKeyExtractor),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            routes,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &StubConfig, state: AppState) -> Router {
        let mut router = Router::new();
        if config.admin.enabled {
            router = router.nest(&config.admin.path_prefix, admin_routes());
        }

        router
            .fallback(stub_handler)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Run the server until `shutdown` fires, applying route table updates
    /// received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<StubConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.load().len(),
            default_url = %self.config.proxy.default_url,
            default_capturing = self.config.proxy.default_capturing,
            "HTTP server starting"
        );

        let routes = self.routes.clone();
        let settings = self.config.proxy.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if new_config.proxy != settings {
                    tracing::warn!("Proxy settings changed on disk; they apply after a restart");
                }
                let table = RouteTable::from_config(&new_config.apis);
                tracing::info!(routes = table.len(), "Route table reloaded");
                routes.store(Arc::new(table));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router with all layers, for in-process requests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &StubConfig {
        &self.config
    }
}

/// Catch-all handler: stored stub, else upstream, else 404.
async fn stub_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_uppercase();

    let (source, response) = match serve(&state, request).await {
        Ok(served) => served,
        Err(e) => (SOURCE_NONE, e.into_response()),
    };

    metrics::record_request(&method, response.status().as_u16(), source, start);
    response
}

async fn serve(
    state: &AppState,
    request: Request<Body>,
) -> Result<(&'static str, Response), AppError> {
    let inbound = InboundRequest::from_request(request, state.max_body_size).await?;
    let method = inbound.method.as_str().to_uppercase();
    let path = inbound.path.clone();

    let routes = state.routes.load_full();
    let api = routes.find(&path, &method);

    let expressions = api.map(|api| api.keys.as_slice()).unwrap_or_default();
    let data_key = key::data_key(&state.keys.extract(&inbound, expressions)?);

    let stored = state
        .store
        .find_by_key(&RecordKey::new(&path, &method, &data_key))
        .await?;
    if let Some(record) = stored {
        tracing::debug!(
            id = ?record.id,
            path = %path,
            method = %method,
            data_key = %data_key,
            request_id = inbound.request_id().unwrap_or("unknown"),
            "Serving stored stub"
        );
        return Ok((SOURCE_STUB, render_stub(&record, &method)?));
    }

    if state.proxy.has_upstream(api) {
        let envelope = state
            .proxy
            .perform(&inbound, &path, &method, &data_key, api)
            .await?;
        return Ok((SOURCE_PROXY, envelope.respond(&method)));
    }

    tracing::debug!(path = %path, method = %method, data_key = %data_key, "No stub and no upstream");
    Err(AppError::NoStub { method, path })
}
