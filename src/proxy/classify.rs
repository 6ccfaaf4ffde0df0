//! Response classification
//!
//! Each upstream response lands in exactly one branch, chosen once before the
//! outbound response is built: redirects get their `Location` proxied, HTML gets
//! buffered and link-rewritten, everything else streams through.

use http::header::{CONTENT_ENCODING, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, StatusCode};
use url::Url;

use crate::error::{ProxyError, Result};
use crate::proxy::target::proxied_path;

/// Statuses whose `Location` header is rewritten
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Redirect,
    Html,
    Passthrough,
}

impl ResponseKind {
    pub fn classify(status: StatusCode, headers: &HeaderMap) -> Self {
        if REDIRECT_STATUSES.contains(&status.as_u16()) {
            return Self::Redirect;
        }

        let is_html = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);

        if is_html && !is_encoded(headers) {
            Self::Html
        } else {
            Self::Passthrough
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Html => "html",
            Self::Passthrough => "passthrough",
        }
    }
}

/// A `Content-Encoding` the client left in place (one it cannot decode).
/// Such bodies are not text and are relayed untouched.
fn is_encoded(headers: &HeaderMap) -> bool {
    headers.get_all(CONTENT_ENCODING).iter().any(|v| {
        v.to_str().map_or(true, |v| {
            v.split(',')
                .map(str::trim)
                .any(|c| !c.is_empty() && !c.eq_ignore_ascii_case("identity"))
        })
    })
}

/// Rewrite the `Location` header of a redirect so it points back through the proxy.
///
/// Relative locations are resolved against the target URL first.
pub fn rewrite_location(headers: &mut HeaderMap, target: &Url) -> Result<()> {
    let location = headers
        .get(LOCATION)
        .ok_or(ProxyError::MissingLocation)?
        .to_str()
        .map_err(|e| ProxyError::InvalidLocation {
            location: String::from_utf8_lossy(headers[LOCATION].as_bytes()).into_owned(),
            reason: e.to_string(),
        })?
        .to_string();

    let absolute = target
        .join(&location)
        .map_err(|e| ProxyError::InvalidLocation {
            location: location.clone(),
            reason: e.to_string(),
        })?;

    let proxied = HeaderValue::from_str(&proxied_path(&absolute)).map_err(|e| {
        ProxyError::InvalidLocation {
            location,
            reason: e.to_string(),
        }
    })?;

    headers.insert(LOCATION, proxied);
    Ok(())
}
