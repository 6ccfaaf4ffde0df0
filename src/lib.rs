//! GlobalProxy - path-addressed HTTP forwarding proxy
//!
//! `GET /example.com/page?x=1` fetches `http(s)://example.com/page?x=1` and relays the
//! response back.
//!
//! ## Features
//!
//! - Target URL taken from the request path, scheme defaulted to the inbound one
//! - Edge-platform request headers (`cf-*` by default) stripped before forwarding
//! - Redirects intercepted and their `Location` pointed back through the proxy
//! - Root-relative links in HTML rewritten to stay on the proxy
//! - Uniform no-cache + permissive CORS headers, uniform JSON errors

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{ProxyError, Result};
