//! Proxy server using Axum
//!
//! Binds one route for the disclaimer page and sends every other path through the
//! proxy pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

use crate::config::ProxyServerConfig;
use crate::error::{panic_response, ProxyError, Result};
use crate::proxy::disclaimer::disclaimer_page;
use crate::proxy::handler::{ProxyHandler, ProxyHandlerConfig};
use crate::proxy::headers::PrefixHeaderFilter;
use crate::proxy::middleware::finish_responses;
use crate::proxy::transport::{HttpUpstream, Upstream};

/// Shared state for the proxy routes
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ProxyHandler>,
}

/// Proxy server
pub struct ProxyServer {
    config: ProxyServerConfig,
    state: AppState,
}

impl ProxyServer {
    /// Create a proxy server dispatching through the HTTP client
    pub fn new(config: ProxyServerConfig) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::new(&config)?);
        Ok(Self::with_upstream(config, upstream))
    }

    /// Create a proxy server with a custom upstream
    pub fn with_upstream(config: ProxyServerConfig, upstream: Arc<dyn Upstream>) -> Self {
        let header_filter = Arc::new(PrefixHeaderFilter::new(&config.strip_header_prefixes));
        let handler = ProxyHandler::new(
            upstream,
            header_filter,
            ProxyHandlerConfig::from(&config),
        );

        Self {
            config,
            state: AppState {
                handler: Arc::new(handler),
            },
        }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let routes = Router::new()
            .route("/", any(disclaimer_page))
            .fallback(proxy_request)
            .with_state(self.state.clone())
            .layer(CatchPanicLayer::custom(panic_response));

        finish_responses(routes).layer(TraceLayer::new_for_http())
    }

    /// Run the proxy server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|e| ProxyError::InvalidConfig(format!("Invalid proxy server address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve(listener, async move {
            let _ = shutdown.changed().await;
        })
        .await
    }

    /// Serve on an already-bound listener until `signal` resolves
    pub async fn serve<F>(&self, listener: tokio::net::TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!("Proxy server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        info!("Proxy server shut down");
        Ok(())
    }
}

/// Error boundary around the pipeline
async fn proxy_request(State(state): State<AppState>, req: Request<Body>) -> Response {
    match state.handler.handle(req).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Proxy request failed");
            e.into_response()
        }
    }
}
