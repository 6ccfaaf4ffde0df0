//! Runtime configuration
//!
//! Everything is read once from the environment at startup; there is no config file.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{ProxyError, Result};

const DEFAULT_MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub proxy: ProxyServerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ProxyServerConfig {
    /// Bind address
    pub host: String,
    pub port: u16,
    /// Seconds allowed to establish the upstream connection
    pub connect_timeout: u64,
    /// Seconds allowed for the upstream call, and again for an HTML body read
    pub request_timeout: u64,
    /// HTML bodies above this size are not rewritten and fail the request
    pub max_html_bytes: usize,
    /// Lowercase request header prefixes never forwarded upstream
    pub strip_header_prefixes: Vec<String>,
    /// Scheme callers use to reach the proxy
    pub public_scheme: PublicScheme,
    /// Take scheme/host from X-Forwarded-Proto / X-Forwarded-Host
    pub trust_forwarded: bool,
    /// Route upstream calls through another proxy
    pub egress_proxy: Option<EgressProxyConfig>,
}

impl ProxyServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// `host:port` the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ProxyServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            connect_timeout: 10,
            request_timeout: 30,
            max_html_bytes: DEFAULT_MAX_HTML_BYTES,
            strip_header_prefixes: vec!["cf-".to_string()],
            public_scheme: PublicScheme::Http,
            trust_forwarded: false,
            egress_proxy: None,
        }
    }
}

/// Inbound scheme of the proxy itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicScheme {
    #[default]
    Http,
    Https,
}

impl PublicScheme {
    /// Accepts `http`, `https`, and the `http:` form with a trailing colon
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_suffix(':').unwrap_or(s);
        if s.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl FromStr for PublicScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("expected http or https, got {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressProxyProtocol {
    Http,
    Socks5,
}

/// Upstream-side proxy all target requests are sent through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressProxyConfig {
    pub protocol: EgressProxyProtocol,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EgressProxyConfig {
    /// Parse `http://`, `https://`, `socks5://` or `socks5h://` proxy URLs with
    /// optional `user:pass@`
    pub fn from_url(raw: &str) -> Result<Self> {
        let invalid = |msg: String| ProxyError::InvalidConfig(format!("PROXY_EGRESS {}", msg));

        let url = Url::parse(raw).map_err(|e| invalid(format!("is not a valid URL: {}", e)))?;
        if url.query().is_some() || url.fragment().is_some() || !matches!(url.path(), "" | "/") {
            return Err(invalid("must be scheme://[user:pass@]host[:port] only".into()));
        }

        let (protocol, default_port) = match url.scheme() {
            "http" | "https" => (EgressProxyProtocol::Http, 80),
            "socks5" | "socks5h" => (EgressProxyProtocol::Socks5, 1080),
            other => return Err(invalid(format!("has unsupported scheme {}", other))),
        };

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| invalid("has no host".into()))?;

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let password = match (&username, url.password()) {
            (None, _) => None,
            (Some(_), Some(p)) if !p.is_empty() => Some(p.to_string()),
            // reqwest sends SOCKS5 auth only with a non-empty password
            (Some(_), _) if protocol == EgressProxyProtocol::Socks5 => {
                return Err(invalid("socks5 credentials need a password".into()))
            }
            (Some(_), _) => Some(String::new()),
        };

        Ok(Self {
            protocol,
            host,
            port: url.port().unwrap_or(default_port),
            username,
            password,
        })
    }

    /// Proxy URL without credentials, as understood by the upstream client
    pub fn proxy_url(&self) -> String {
        let scheme = match self.protocol {
            EgressProxyProtocol::Http => "http",
            // Resolve names on the proxy side.
            EgressProxyProtocol::Socks5 => "socks5h",
        };
        if self.host.contains(':') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter level when RUST_LOG is unset
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = ProxyServerConfig::default();

        let egress_proxy = match env::var("PROXY_EGRESS") {
            Ok(raw) if !raw.trim().is_empty() => Some(EgressProxyConfig::from_url(raw.trim())?),
            _ => None,
        };

        let proxy = ProxyServerConfig {
            host: env::var("PROXY_HOST").unwrap_or(defaults.host),
            port: env_parse("PROXY_PORT", defaults.port)?,
            connect_timeout: env_parse("PROXY_CONNECT_TIMEOUT", defaults.connect_timeout)?,
            request_timeout: env_parse("PROXY_REQUEST_TIMEOUT", defaults.request_timeout)?,
            max_html_bytes: env_parse("PROXY_MAX_HTML_BYTES", defaults.max_html_bytes)?,
            strip_header_prefixes: match env::var("PROXY_STRIP_HEADER_PREFIXES") {
                Ok(raw) => split_prefixes(&raw),
                Err(_) => defaults.strip_header_prefixes,
            },
            public_scheme: env_parse("PROXY_PUBLIC_SCHEME", defaults.public_scheme)?,
            trust_forwarded: env_parse("PROXY_TRUST_FORWARDED", defaults.trust_forwarded)?,
            egress_proxy,
        };

        Ok(Config {
            proxy,
            log: LogConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                format: env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            },
        })
    }
}

/// Parse `key` if set and non-empty, otherwise fall back to `default`
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| ProxyError::InvalidConfig(format!("{} = {:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}

fn split_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
