//! Static disclaimer page served at `/`

use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::proxy::server::AppState;
use crate::proxy::target::InboundOrigin;

const DISCLAIMER_TEMPLATE: &str = include_str!("disclaimer.html");
const PLACEHOLDER: &str = "{{PROXY_BASE}}";

/// Render the disclaimer with the proxy's own base URL in the usage hint
pub fn render(proxy_base: &str) -> String {
    DISCLAIMER_TEMPLATE.replace(PLACEHOLDER, &html_escape(proxy_base))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Handler for `/`, any method
pub async fn disclaimer_page(State(state): State<AppState>, parts: Parts) -> Response {
    let inbound = InboundOrigin::from_parts(
        &parts,
        state.handler.config().public_scheme,
        state.handler.config().trust_forwarded,
    );
    let base = inbound.base().unwrap_or_default();

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )],
        render(&base),
    )
        .into_response()
}
