//! Reverse proxy forwarding to fixed upstreams.
//!
//! # Responsibilities
//! - Pick the most specific upstream for a path
//! - Replay method, headers, body and query to the upstream
//! - Stream the upstream response back unbuffered
//! - Bound every upstream exchange with a timeout
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped in both directions
//! - Host header kept as sent by the client
//! - No retries: the caller retries
//! - Dropping the forward future (client gone) drops the upstream request

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::http::response::AppError;
use crate::observability::metrics;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors raised while forwarding.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no upstream for path {0}")]
    NoTarget(String),

    #[error("invalid upstream uri: {0}")]
    InvalidUri(String),

    #[error("upstream {upstream} did not respond within {after:?}")]
    Timeout { upstream: String, after: Duration },

    #[error("upstream {upstream} request failed: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(e: ProxyError) -> Self {
        AppError::new(e.to_string()).with_status(e.status_code())
    }
}

/// A path prefix bound to an upstream base URL.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub prefix: String,
    pub upstream: Url,
}

impl ProxyTarget {
    /// Upstream URI for a request path and query.
    fn uri_for(&self, path_and_query: &str) -> Result<Uri, ProxyError> {
        let base_path = self.upstream.path().trim_end_matches('/');
        let host = self
            .upstream
            .host_str()
            .ok_or_else(|| ProxyError::InvalidUri(self.upstream.to_string()))?;
        let authority = match self.upstream.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        format!(
            "{}://{}{}{}",
            self.upstream.scheme(),
            authority,
            base_path,
            path_and_query
        )
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| ProxyError::InvalidUri(e.to_string()))
    }
}

/// Forwards requests to the configured upstreams.
#[derive(Debug, Clone)]
pub struct Forwarder {
    targets: Vec<ProxyTarget>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Forwarder {
    /// Build a forwarder. Longer prefixes are checked first.
    pub fn new(upstreams: &[UpstreamConfig], timeouts: &TimeoutConfig) -> Result<Self, ProxyError> {
        let mut targets = upstreams
            .iter()
            .map(|u| {
                Url::parse(&u.target)
                    .map(|upstream| ProxyTarget {
                        prefix: u.prefix.clone(),
                        upstream,
                    })
                    .map_err(|e| ProxyError::InvalidUri(format!("{}: {}", u.target, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !targets.iter().any(|t| t.prefix == "/") {
            return Err(ProxyError::NoTarget("/".to_string()));
        }
        targets.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            targets,
            client,
            timeout: Duration::from_secs(timeouts.upstream_secs),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The upstream responsible for a path.
    pub fn select(&self, path: &str) -> Option<&ProxyTarget> {
        self.targets.iter().find(|t| path.starts_with(&t.prefix))
    }

    /// Forward a request and stream back the upstream response.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response, ProxyError> {
        let start_time = Instant::now();
        let path = request.uri().path().to_string();
        let target = self
            .select(&path)
            .ok_or_else(|| ProxyError::NoTarget(path.clone()))?;
        let upstream = target.upstream.as_str().trim_end_matches('/').to_string();

        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();
        parts.uri = target.uri_for(&path_and_query)?;

        strip_hop_by_hop(&mut parts.headers);
        set_forwarded_headers(&mut parts.headers, client_addr);

        let method = parts.method.clone();
        tracing::debug!(
            method = %method,
            path = %path,
            upstream = %upstream,
            "Proxying request"
        );

        let outbound = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(self.timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                metrics::record_upstream_error(&upstream, "connect");
                return Err(ProxyError::Upstream { upstream, source });
            }
            Err(_) => {
                metrics::record_upstream_error(&upstream, "timeout");
                return Err(ProxyError::Timeout {
                    upstream,
                    after: self.timeout,
                });
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), &upstream, start_time);

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn set_forwarded_headers(headers: &mut HeaderMap, client_addr: Option<SocketAddr>) {
    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(X_FORWARDED_HOST) {
        if let Some(host) = headers.get(header::HOST).cloned() {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }

    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
}
