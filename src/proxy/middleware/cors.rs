//! Response finishing: no-cache and permissive CORS headers
//!
//! Applied as overriding header layers so every outbound response carries them,
//! including the disclaimer page, error responses and caught panics. Preflight
//! requests are not intercepted; they are proxied like any other method.

use axum::http::header;
use axum::http::HeaderValue;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

pub const CACHE_CONTROL_VALUE: &str = "no-store";
pub const ALLOW_ORIGIN_VALUE: &str = "*";
pub const ALLOW_METHODS_VALUE: &str = "GET, POST, PUT, DELETE";
pub const ALLOW_HEADERS_VALUE: &str = "*";

/// Wrap a router so its responses get the finishing headers, overwriting upstream values
pub fn finish_responses<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN_VALUE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS_VALUE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS_VALUE),
        ))
}
