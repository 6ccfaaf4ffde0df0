//! Proxy server implementation
//!
//! This module provides the forwarding pipeline:
//! - Target URL resolution from the request path
//! - Request header filtering
//! - Upstream dispatch with manual redirects
//! - Redirect / HTML / passthrough response handling
//! - No-cache and CORS response finishing

pub mod classify;
pub mod disclaimer;
pub mod handler;
pub mod headers;
pub mod middleware;
pub mod rewrite;
pub mod server;
pub mod target;
pub mod transport;

#[cfg(test)]
mod testing;

pub use classify::ResponseKind;
pub use handler::{ProxyHandler, ProxyHandlerConfig};
pub use headers::{HeaderFilter, PrefixHeaderFilter};
pub use rewrite::LinkRewriter;
pub use server::ProxyServer;
pub use target::{resolve_target, InboundOrigin};
pub use transport::{HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
