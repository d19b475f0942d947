//! Request forwarding to the internal backend.
//!
//! # Responsibilities
//! - Build the outbound request from a matched route and sanitized
//!   parameters
//! - Copy only allow-listed headers; add gateway identification headers
//! - Execute against the backend with a bounded timeout, no retries
//! - Relay the response back, streaming the body
//!
//! # Design Decisions
//! - One pooled client shared by every request and both listeners
//! - The backend is reached over plain HTTP on a trusted path
//! - Path parameters are decoded, traversal-stripped, and length-bounded
//!   before they touch the outbound path

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::form_urlencoded;

use crate::config::GatewayConfig;
use crate::routing::QueryPolicy;

/// Echo of the upstream reverse-proxy marker header.
pub const FORWARDED_PROXY: &str = "Gw-Forwarded-Proxy";

/// Externally observed scheme and host, e.g. `https://vpn.example.com`.
pub const FORWARDED_URL: &str = "Gw-Forwarded-Url";

/// Parsed client address, port and brackets stripped.
pub const FORWARDED_FOR: &str = "Gw-Forwarded-For";

/// Inbound headers that may cross to the backend. Everything else stays
/// on the floor.
pub const ALLOWED_HEADERS: &[&str] = &[
    "Auth-Token",
    "Auth-Timestamp",
    "Auth-Nonce",
    "Auth-Signature",
    "Cookie",
    "Csrf-Token",
];

/// Errors raised while forwarding a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A route declared a JSON body but the client sent something else.
    #[error("request: invalid content type")]
    InvalidContentType,

    /// The body did not match the declared shape.
    #[error("request: body does not match declared shape: {0}")]
    Schema(#[from] serde_json::Error),

    /// The outbound request could not be constructed.
    #[error("request: failed to build backend request: {0}")]
    BuildRequest(#[from] axum::http::Error),

    /// The backend was unreachable or refused the connection.
    #[error("request: backend request failed: {0}")]
    Upstream(String),

    /// The backend did not answer within the bound.
    #[error("request: backend timed out")]
    UpstreamTimeout,

    /// The inbound body could not be read.
    #[error("request: failed to read request body")]
    BodyRead,
}

/// One outbound request, assembled by the dispatcher.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Internal path, already sanitized and substituted.
    pub path: String,
    /// Encoded query string, if any.
    pub query: Option<String>,
    /// Canonicalized JSON body, if the route declares one.
    pub json: Option<Vec<u8>>,
    /// Route-specific extra headers to copy from the inbound request.
    pub extra_headers: &'static [&'static str],
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            json: None,
            extra_headers: &[],
        }
    }
}

/// Externally observed facts about the inbound connection, passed along
/// so the backend can reconstruct the original request context.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Host the client addressed, as sent.
    pub host: String,
    /// Client IP, no port, no IPv6 brackets.
    pub remote_ip: String,
}

/// Shared forwarder: pooled client plus the config facts it needs.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    internal_addr: String,
    marker_header: Option<String>,
    external_scheme: &'static str,
    upstream_timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            internal_addr: config.backend.internal_addr.clone(),
            marker_header: config.proxy.marker_header.clone(),
            external_scheme: config.scheme(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        }
    }

    /// Execute a forwarded request and relay the backend's response.
    pub async fn send(
        &self,
        proxy_req: ProxyRequest,
        inbound: &HeaderMap,
        client_info: &ClientInfo,
    ) -> Result<Response<Body>, GatewayError> {
        let mut uri = format!("http://{}{}", self.internal_addr, proxy_req.path);
        if let Some(query) = proxy_req.query.as_deref().filter(|q| !q.is_empty()) {
            uri.push('?');
            uri.push_str(query);
        }

        let mut builder = Request::builder().method(proxy_req.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            self.identify(headers, inbound, client_info);

            for name in ALLOWED_HEADERS.iter().chain(proxy_req.extra_headers) {
                copy_header(headers, inbound, name);
            }
            if proxy_req.json.is_some() {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
        }

        let body = match proxy_req.json {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };
        let request = builder.body(body)?;

        self.execute(request).await
    }

    /// Health-check forward for the plaintext listener: gateway
    /// identification only, no client headers cross.
    pub async fn check(
        &self,
        inbound: &HeaderMap,
        client_info: &ClientInfo,
    ) -> Result<Response<Body>, GatewayError> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(format!("http://{}/check", self.internal_addr));
        if let Some(headers) = builder.headers_mut() {
            self.identify(headers, inbound, client_info);
        }
        let request = builder.body(Body::empty())?;

        self.execute(request).await
    }

    /// Bare fetch with no added headers, used for the ACME passthrough.
    pub async fn fetch_raw(&self, path: &str) -> Result<Response<Body>, GatewayError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("http://{}{}", self.internal_addr, path))
            .body(Body::empty())?;

        self.execute(request).await
    }

    async fn execute(&self, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let response: Response<hyper::body::Incoming> =
            tokio::time::timeout(self.upstream_timeout, self.client.request(request))
                .await
                .map_err(|_| GatewayError::UpstreamTimeout)?
                .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        parts.headers.remove(header::SERVER);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Add the gateway identification headers.
    fn identify(&self, headers: &mut HeaderMap, inbound: &HeaderMap, client_info: &ClientInfo) {
        let marker = self
            .marker_header
            .as_deref()
            .and_then(|name| inbound.get(name))
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(""));
        headers.insert(FORWARDED_PROXY, marker);

        let forward_url = format!("{}://{}", self.external_scheme, client_info.host);
        if let Ok(value) = HeaderValue::from_str(&forward_url) {
            headers.insert(FORWARDED_URL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&client_info.remote_ip) {
            headers.insert(FORWARDED_FOR, value);
        }
    }
}

fn copy_header(dst: &mut HeaderMap, src: &HeaderMap, name: &str) {
    if let Some(value) = src.get(name) {
        if let Ok(name) = header::HeaderName::try_from(name) {
            dst.insert(name, value.clone());
        }
    }
}

/// Substitute sanitized parameters into an internal path template.
pub fn build_path(
    template: &str,
    params: &[(&'static str, String)],
    limit: usize,
) -> String {
    let mut path = String::new();
    for segment in template.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        let piece = if let Some(name) = segment.strip_prefix(':') {
            param_value(params, name).map(|raw| sanitize_param(raw, limit))
        } else if let Some(name) = segment.strip_prefix('*') {
            param_value(params, name).map(|raw| sanitize_tail(raw, limit))
        } else {
            Some(segment.to_string())
        };
        match piece {
            Some(p) if !p.is_empty() => {
                path.push('/');
                path.push_str(&p);
            }
            _ => {}
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

fn param_value<'a>(params: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.as_str())
}

/// Decode and neutralize one path parameter: percent-decode, drop
/// traversal sequences and separators, bound the length.
pub fn sanitize_param(raw: &str, limit: usize) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let mut value = decoded.replace("..", "");
    value.retain(|c| c != '/' && c != '\\' && !c.is_control());
    truncate_bytes(&mut value, limit);
    value
}

/// Sanitize a wildcard tail segment by segment, keeping its slashes.
pub fn sanitize_tail(raw: &str, limit: usize) -> String {
    raw.split('/')
        .map(|segment| sanitize_param(segment, limit))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate_bytes(value: &mut String, limit: usize) {
    if value.len() > limit {
        let mut end = limit;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
}

/// Build the outbound query string for a route's policy.
pub fn build_query(policy: QueryPolicy, raw_query: Option<&str>) -> Option<String> {
    match policy {
        QueryPolicy::None => None,
        QueryPolicy::Raw => raw_query.map(str::to_string),
        QueryPolicy::Allow(names) => {
            let raw = raw_query?;
            let pairs: Vec<(String, String)> =
                form_urlencoded::parse(raw.as_bytes()).into_owned().collect();

            let mut serializer = form_urlencoded::Serializer::new(String::new());
            let mut any = false;
            for name in names {
                for (key, value) in &pairs {
                    if key == name && !value.is_empty() {
                        serializer.append_pair(key, value);
                        any = true;
                    }
                }
            }
            any.then(|| serializer.finish())
        }
    }
}
