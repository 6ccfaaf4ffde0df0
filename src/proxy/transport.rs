//! Upstream transport
//!
//! The pipeline only needs "send request, get status + headers + streamable body
//! back", so dispatch sits behind the [`Upstream`] trait. [`HttpUpstream`] is the
//! production implementation on top of a shared `reqwest` client with redirect
//! following disabled.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{EgressProxyConfig, EgressProxyProtocol, ProxyServerConfig};
use crate::error::{ProxyError, Result};
use crate::proxy::headers::strip_transport_headers;

/// Request handed to the upstream, already pointed at the target URL
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Response received from the upstream; the body has not been read yet
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Sends a forwarded request without following redirects
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

/// `reqwest`-backed upstream
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &ProxyServerConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout());

        builder = match &config.egress_proxy {
            Some(egress) => builder.proxy(egress_proxy(egress)?),
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| ProxyError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
        })
    }
}

fn egress_proxy(egress: &EgressProxyConfig) -> Result<reqwest::Proxy> {
    let mut proxy = reqwest::Proxy::all(egress.proxy_url())
        .map_err(|e| ProxyError::InvalidConfig(format!("Invalid egress proxy: {}", e)))?;

    if let Some(username) = &egress.username {
        let password = egress.password.as_deref().unwrap_or_default();
        proxy = match egress.protocol {
            EgressProxyProtocol::Http => proxy.basic_auth(username, password),
            // SOCKS credentials travel in the URL.
            EgressProxyProtocol::Socks5 => {
                let mut url = Url::parse(&egress.proxy_url())
                    .map_err(|e| ProxyError::InvalidConfig(format!("Invalid egress proxy: {}", e)))?;
                let _ = url.set_username(username);
                let _ = url.set_password(Some(password));
                reqwest::Proxy::all(url.as_str()).map_err(|e| {
                    ProxyError::InvalidConfig(format!("Invalid egress proxy: {}", e))
                })?
            }
        };
    }

    Ok(proxy)
}

#[async_trait]
impl Upstream for HttpUpstream {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let UpstreamRequest {
            method,
            url,
            mut headers,
            body,
        } = request;

        strip_transport_headers(&mut headers);

        let mut builder = self.client.request(method, url).headers(headers);
        if !body.is_end_stream() {
            builder = builder.body(stream_body(body));
        }

        let response = tokio::time::timeout(self.request_timeout, builder.send())
            .await
            .map_err(|_| ProxyError::Timeout(self.request_timeout))??;

        debug!(status = %response.status(), "Upstream responded");

        let status = response.status();
        let headers = response.headers().clone();
        let body = Body::from_stream(response.bytes_stream());

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Forward the inbound body as a stream.
///
/// The inbound body is `Send` but not `Sync`, so chunks are relayed through a
/// channel owned by a pump task.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<std::result::Result<Bytes, axum::Error>>(16);

    tokio::spawn(async move {
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            if tx.send(chunk).await.is_err() {
                debug!("Upstream dropped request body early");
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}
