//! Proxy request handler
//!
//! Runs the per-request pipeline: resolve target → filter headers → dispatch →
//! classify → build the outbound response. Finishing headers are added by the
//! router layers, errors become `500` JSON at the route boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, info, instrument};

use crate::config::{ProxyServerConfig, PublicScheme};
use crate::error::{ProxyError, Result};
use crate::proxy::classify::{rewrite_location, ResponseKind};
use crate::proxy::headers::{strip_hop_by_hop, HeaderFilter};
use crate::proxy::rewrite::LinkRewriter;
use crate::proxy::target::{resolve_target, InboundOrigin};
use crate::proxy::transport::{Upstream, UpstreamRequest, UpstreamResponse};

/// Configuration for proxy handler
#[derive(Debug, Clone)]
pub struct ProxyHandlerConfig {
    /// Inbound scheme when no trusted forwarded scheme is present
    pub public_scheme: PublicScheme,
    /// Honor X-Forwarded-Proto / X-Forwarded-Host
    pub trust_forwarded: bool,
    /// Largest HTML body buffered for rewriting
    pub max_html_bytes: usize,
    /// Deadline for reading an HTML body
    pub request_timeout: Duration,
}

impl Default for ProxyHandlerConfig {
    fn default() -> Self {
        Self::from(&ProxyServerConfig::default())
    }
}

impl From<&ProxyServerConfig> for ProxyHandlerConfig {
    fn from(config: &ProxyServerConfig) -> Self {
        Self {
            public_scheme: config.public_scheme,
            trust_forwarded: config.trust_forwarded,
            max_html_bytes: config.max_html_bytes,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Proxy request handler
pub struct ProxyHandler {
    upstream: Arc<dyn Upstream>,
    header_filter: Arc<dyn HeaderFilter>,
    config: ProxyHandlerConfig,
}

impl ProxyHandler {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        header_filter: Arc<dyn HeaderFilter>,
        config: ProxyHandlerConfig,
    ) -> Self {
        Self {
            upstream,
            header_filter,
            config,
        }
    }

    pub fn config(&self) -> &ProxyHandlerConfig {
        &self.config
    }

    /// Handle an incoming proxied request
    #[instrument(skip(self, req), fields(method = %req.method(), uri = %req.uri()))]
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>> {
        let start = Instant::now();
        let (parts, body) = req.into_parts();

        let inbound = InboundOrigin::from_parts(
            &parts,
            self.config.public_scheme,
            self.config.trust_forwarded,
        );
        let target = resolve_target(parts.uri.path(), parts.uri.query(), inbound.scheme)?;
        let headers = self.header_filter.filter(&parts.headers);

        debug!(target = %target, "Forwarding request");

        let UpstreamResponse {
            status,
            mut headers,
            body,
        } = self
            .upstream
            .send(UpstreamRequest {
                method: parts.method,
                url: target.clone(),
                headers,
                body,
            })
            .await?;

        let kind = ResponseKind::classify(status, &headers);
        strip_hop_by_hop(&mut headers);

        let body = match kind {
            ResponseKind::Redirect => {
                rewrite_location(&mut headers, &target)?;
                body
            }
            ResponseKind::Html => {
                let rewriter = LinkRewriter::new(&inbound, &target)?;
                let text = self.read_text(body).await?;
                headers.remove(CONTENT_LENGTH);
                Body::from(rewriter.rewrite(&text))
            }
            ResponseKind::Passthrough => body,
        };

        info!(
            target = %target,
            status = status.as_u16(),
            branch = kind.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Relayed upstream response"
        );

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// Buffer the whole body and decode it as (lossy) UTF-8
    async fn read_text(&self, body: Body) -> Result<String> {
        let limit = self.config.max_html_bytes;
        let collected = tokio::time::timeout(
            self.config.request_timeout,
            Limited::new(body, limit).collect(),
        )
        .await
        .map_err(|_| ProxyError::Timeout(self.config.request_timeout))?
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ProxyError::BodyTooLarge { limit }
            } else {
                ProxyError::Body(e.to_string())
            }
        })?;

        Ok(String::from_utf8_lossy(&collected.to_bytes()).into_owned())
    }
}
