//! Request/response header policy
//!
//! Edge platforms inject their own headers (`cf-*` on Cloudflare, `x-vercel-*`, ...).
//! Those must not leak to the target, so the filter is a trait with a prefix-list
//! implementation driven by configuration.

use http::header::{self, HeaderMap, HeaderName};

/// Decides which inbound request headers are forwarded upstream
pub trait HeaderFilter: Send + Sync {
    /// Whether a header with this name is forwarded
    fn keep(&self, name: &HeaderName) -> bool;

    /// Build a new header collection containing only kept entries
    fn filter(&self, headers: &HeaderMap) -> HeaderMap {
        let mut filtered = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if self.keep(name) {
                filtered.append(name.clone(), value.clone());
            }
        }
        filtered
    }
}

/// Drops headers whose name starts with any of the reserved prefixes
#[derive(Debug, Clone)]
pub struct PrefixHeaderFilter {
    prefixes: Vec<String>,
}

impl PrefixHeaderFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Header names are always lowercase.
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self { prefixes }
    }
}

impl HeaderFilter for PrefixHeaderFilter {
    fn keep(&self, name: &HeaderName) -> bool {
        let name = name.as_str();
        !self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Remove hop-by-hop headers in place
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop_header(name.as_str()))
        .cloned()
        .collect();

    for name in hop {
        headers.remove(&name);
    }
}

/// Headers the upstream client owns: connection management, the target `Host`,
/// and `Accept-Encoding`, which must only name codings the client can decode
pub fn strip_transport_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(header::HOST);
    headers.remove(header::ACCEPT_ENCODING);
}
