//! In-memory upstream for pipeline tests

use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;

use crate::error::{ProxyError, Result};
use crate::proxy::transport::{Upstream, UpstreamRequest, UpstreamResponse};

/// What the mock upstream saw
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Canned upstream reply
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    pub fn bytes(status: u16, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
        .header("content-type", content_type)
    }

    pub fn text(status: u16, content_type: &'static str, body: &'static str) -> Self {
        Self::bytes(status, content_type, Bytes::from_static(body.as_bytes()))
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }
}

/// Upstream that records each request and answers with a fixed reply, or fails
pub struct MockUpstream {
    reply: Option<Reply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockUpstream {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every dispatch fails like an unreachable host
    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let body = request
            .body
            .collect()
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?
            .to_bytes();

        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers,
            body,
        });

        let reply = self
            .reply
            .clone()
            .ok_or_else(|| ProxyError::Internal("connection refused".to_string()))?;

        Ok(UpstreamResponse {
            status: StatusCode::from_u16(reply.status)
                .map_err(|e| ProxyError::Internal(e.to_string()))?,
            headers: reply.headers,
            body: Body::from(reply.body),
        })
    }
}
