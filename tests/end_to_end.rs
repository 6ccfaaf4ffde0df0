//! End-to-end tests: proxy router → reqwest upstream → local axum backend.

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use globalproxy::config::ProxyServerConfig;
use globalproxy::proxy::ProxyServer;
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

const BLOB: &[u8] = b"\x00\x01\x02binary\xff\xfe payload";
// zstd frame header followed by non-UTF-8 bytes
const ZSTD_HTML: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd, 0x24, 0x05, 0x29, 0x00, 0xff, 0x2f, 0x68];

async fn start_backend() -> SocketAddr {
    let app = Router::new()
        .route(
            "/html",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    r#"<a href="/next">next</a><img src="//cdn.example/i.png">"#,
                )
            }),
        )
        .route("/redirect", get(|| async { Redirect::temporary("/html") }))
        .route(
            "/blob",
            get(|| async { ([(header::CONTENT_TYPE, "application/octet-stream")], BLOB) }),
        )
        .route(
            "/zstd",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "text/html"),
                        (header::CONTENT_ENCODING, "zstd"),
                    ],
                    ZSTD_HTML,
                )
            }),
        )
        .route(
            "/echo",
            post(|headers: HeaderMap, body: Bytes| async move {
                let saw_cf = headers.contains_key("cf-ray").to_string();
                let accept_encoding = headers
                    .get(header::ACCEPT_ENCODING)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let host = headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (
                    StatusCode::ACCEPTED,
                    [
                        ("x-saw-cf", saw_cf),
                        ("x-saw-host", host),
                        ("x-saw-accept-encoding", accept_encoding),
                    ],
                    body,
                )
                    .into_response()
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn proxy() -> Router {
    ProxyServer::new(ProxyServerConfig::default())
        .unwrap()
        .build_router()
}

async fn call(request: Request<Body>) -> Response {
    proxy().oneshot(request).await.unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "proxy.test")
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

#[tokio::test]
async fn test_html_is_fetched_and_rewritten() {
    let backend = start_backend().await;

    let response = call(get_request(&format!("/http://{}/html", backend))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body = body_bytes(response).await;
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        format!(
            r#"<a href="http://proxy.test/http://{}/next">next</a><img src="//cdn.example/i.png">"#,
            backend
        )
    );
}

#[tokio::test]
async fn test_scheme_is_defaulted_from_inbound() {
    let backend = start_backend().await;

    // No scheme in the path: the proxy's own `http` is used.
    let response = call(get_request(&format!("/{}/blob", backend))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), BLOB);
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let backend = start_backend().await;

    let response = call(get_request(&format!("/http://{}/redirect", backend))).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let expected = format!("/http%3A%2F%2F127.0.0.1%3A{}%2Fhtml", backend.port());
    assert_eq!(response.headers()[header::LOCATION], expected.as_str());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_post_body_and_headers_are_forwarded() {
    let backend = start_backend().await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/http://{}/echo", backend))
        .header("host", "proxy.test")
        .header("cf-ray", "8a1b2c3d")
        .header("accept-encoding", "gzip, deflate, br, zstd")
        .header("content-type", "text/plain")
        .body(Body::from("hello upstream"))
        .unwrap();

    let response = call(request).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-saw-cf"], "false");
    assert_eq!(
        response.headers()["x-saw-host"],
        backend.to_string().as_str()
    );
    let accept_encoding = response.headers()["x-saw-accept-encoding"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(!accept_encoding.contains("zstd"), "{}", accept_encoding);
    assert_eq!(body_bytes(response).await.as_ref(), b"hello upstream");
}

#[tokio::test]
async fn test_undecodable_html_is_relayed_untouched() {
    let backend = start_backend().await;

    let request = Request::builder()
        .uri(format!("/http://{}/zstd", backend))
        .header("host", "proxy.test")
        .header("accept-encoding", "gzip, deflate, br, zstd")
        .body(Body::empty())
        .unwrap();
    let response = call(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "zstd");
    assert_eq!(body_bytes(response).await.as_ref(), ZSTD_HTML);
}

#[tokio::test]
async fn test_unreachable_target_is_500_json() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = call(get_request(&format!("/http://{}/", addr))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Upstream request failed"));
}
