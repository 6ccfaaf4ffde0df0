//! Target URL resolution
//!
//! Turns the inbound request path into the absolute URL the proxy fetches, and
//! captures the inbound scheme/host that rewritten links must point back to.

use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::config::PublicScheme;
use crate::error::{ProxyError, Result};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Characters left unescaped when a URL is embedded as a single path component.
/// Mirrors the browser `encodeURIComponent` set.
pub const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode an absolute URL as a proxied path: `/` + percent-encoded URL
pub fn proxied_path(url: &Url) -> String {
    format!("/{}", utf8_percent_encode(url.as_str(), URI_COMPONENT))
}

/// Scheme and host the caller used to reach the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundOrigin {
    pub scheme: PublicScheme,
    pub host: Option<String>,
}

impl InboundOrigin {
    /// Derive the inbound origin from request parts.
    ///
    /// Forwarded headers only take effect when `trust_forwarded` is set; otherwise
    /// the configured public scheme and the `Host` header (or URI authority) win.
    pub fn from_parts(parts: &Parts, default_scheme: PublicScheme, trust_forwarded: bool) -> Self {
        let forwarded_scheme = if trust_forwarded {
            first_value(&parts.headers, X_FORWARDED_PROTO).and_then(|v| PublicScheme::parse(&v))
        } else {
            None
        };

        let forwarded_host = if trust_forwarded {
            first_value(&parts.headers, X_FORWARDED_HOST)
        } else {
            None
        };

        let host = forwarded_host
            .or_else(|| first_value(&parts.headers, HOST.as_str()))
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));

        Self {
            scheme: forwarded_scheme.unwrap_or(default_scheme),
            host,
        }
    }

    pub fn host(&self) -> Result<&str> {
        self.host.as_deref().ok_or(ProxyError::MissingHost)
    }

    /// `scheme://host`, the base every proxied link starts from
    pub fn base(&self) -> Result<String> {
        Ok(format!("{}://{}", self.scheme.as_str(), self.host()?))
    }
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn has_malformed_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

/// Resolve the target URL from the raw (percent-encoded) request path and query.
///
/// The first `/` is stripped and the rest percent-decoded; a `%` not followed by two
/// hex digits, or a decode that is not UTF-8, fails. Candidates without an
/// explicit `http://`/`https://` prefix get the inbound scheme. A non-empty query is
/// re-attached unmodified.
pub fn resolve_target(path: &str, query: Option<&str>, scheme: PublicScheme) -> Result<Url> {
    let encoded = path.strip_prefix('/').unwrap_or(path);
    if has_malformed_escape(encoded) {
        return Err(ProxyError::InvalidEncoding);
    }
    let decoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|_| ProxyError::InvalidEncoding)?;

    let mut candidate = if decoded.starts_with("http://") || decoded.starts_with("https://") {
        decoded.into_owned()
    } else {
        format!("{}://{}", scheme.as_str(), decoded)
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        candidate.push('?');
        candidate.push_str(query);
    }

    let url = Url::parse(&candidate).map_err(|e| ProxyError::InvalidTarget {
        target: candidate.clone(),
        reason: e.to_string(),
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ProxyError::InvalidTarget {
            target: candidate,
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}
