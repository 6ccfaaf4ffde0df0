use std::any::Any;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for the proxy pipeline
///
/// Every variant is reported to the caller the same way: a `500` with a JSON
/// body carrying the message. The variants only exist to keep logs precise.
#[derive(Error, Debug)]
pub enum ProxyError {
    // Target resolution
    #[error("Invalid target URL '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Target path has a malformed percent escape or is not UTF-8")]
    InvalidEncoding,

    #[error("Unable to determine inbound host")]
    MissingHost,

    // Redirect rewriting
    #[error("Redirect response is missing a Location header")]
    MissingLocation,

    #[error("Invalid redirect location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    // Upstream errors
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("HTML body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the uniform error response for a failure message.
pub fn error_response(message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
    };

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.to_string())
    }
}

/// Panic handler for `CatchPanicLayer`, reports panics through the same boundary
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    error_response(ProxyError::Internal(detail).to_string())
}
