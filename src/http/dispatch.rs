//! Per-request control flow.
//!
//! # Responsibilities
//! - Enforce HTTPS when a fronting proxy reports plain HTTP
//! - Look up the route entry; 404 on no match
//! - Apply the auth verdict and render rejections
//! - Assemble the forwarded request and relay the response
//!
//! # Design Decisions
//! - One generic handler behind the router fallback; every route is data
//! - Rejected tokens trigger a fire-and-forget backend session
//!   termination that never delays the client-visible response
//! - Upstream and schema failures render as terse 5xx text, details stay
//!   in the logs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::auth::{DenyReason, Verdict};
use crate::http::forward::{self, ClientInfo, Forwarder, GatewayError, ProxyRequest};
use crate::http::server::AppState;
use crate::routing::{Access, RouteAction, RouteMatch};

/// Entry point for every request on the main listener.
pub async fn handle(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Dispatching request"
    );

    if let Some(response) = enforce_https(&state, &request) {
        return response;
    }

    let Some(route) = state.routes.lookup(&method, &path) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        return (StatusCode::NOT_FOUND, "404 Not Found").into_response();
    };

    if let RouteAction::Fixed { body, content_type } = route.entry.action {
        return ([(header::CONTENT_TYPE, content_type)], body).into_response();
    }

    let client_info = ClientInfo {
        host: request_host(&request),
        remote_ip: addr.ip().to_string(),
    };

    if route.entry.access == Access::Authenticated {
        let cookie = token_cookie(request.headers());
        match state.verifier.verify(cookie.as_deref(), unix_now()) {
            Verdict::Validated { id } => {
                tracing::debug!(request_id = %request_id, session = %id, "Session validated");
            }
            Verdict::Unvalidated { reason: None } => {
                // Strict mode off and no cookie: the backend's API-key
                // auth owns the decision.
            }
            Verdict::Unvalidated {
                reason: Some(reason),
            } => {
                tracing::info!(
                    request_id = %request_id,
                    path = %path,
                    reason = reason.as_str(),
                    "Rejecting unauthenticated request"
                );
                end_session(&state, request.headers().clone(), client_info.clone());
                return deny(&path, reason);
            }
        }
    }

    match forward_request(&state, route, request, &client_info).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(request_id = %request_id, error = %err, "Handler error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error",
            )
                .into_response()
        }
    }
}

/// Build and execute the backend call for a matched route.
async fn forward_request(
    state: &AppState,
    route: RouteMatch<'_>,
    request: Request<Body>,
    client_info: &ClientInfo,
) -> Result<Response, GatewayError> {
    let RouteAction::Forward { internal } = route.entry.action else {
        unreachable!("fixed routes answered before forwarding");
    };

    let raw_query = request.uri().query().map(str::to_string);
    let (parts, body) = request.into_parts();

    let json = match route.entry.body {
        Some(schema) => {
            let content_type = parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if !content_type.starts_with("application/json") {
                return Err(GatewayError::InvalidContentType);
            }

            let bytes = axum::body::to_bytes(body, state.config.limits.max_body_bytes)
                .await
                .map_err(|_| GatewayError::BodyRead)?;
            Some(schema.canonicalize(&bytes)?)
        }
        None => None,
    };

    let limit = route
        .entry
        .param_limit
        .unwrap_or(state.config.limits.max_param_bytes);

    let mut proxy_req = ProxyRequest::new(
        route.entry.method.clone(),
        forward::build_path(internal, &route.params, limit),
    );
    proxy_req.query = forward::build_query(route.entry.query, raw_query.as_deref());
    proxy_req.json = json;
    proxy_req.extra_headers = route.entry.extra_headers;

    let response = state
        .forwarder
        .send(proxy_req, &parts.headers, client_info)
        .await?;
    Ok(response)
}

/// 301 to the HTTPS equivalent when a fronting proxy says the client
/// arrived over plain HTTP. Host port is stripped; HTTPS owns 443.
fn enforce_https(state: &AppState, request: &Request<Body>) -> Option<Response> {
    let proto_header = state.config.proxy.proto_header.as_deref()?;
    let proto = request.headers().get(proto_header)?.to_str().ok()?;
    if !proto.eq_ignore_ascii_case("http") {
        return None;
    }

    let host = request_host(request);
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{}{}", strip_port(&host), path_and_query);

    Some(
        (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, location)],
        )
            .into_response(),
    )
}

/// Render an authentication rejection: the root page bounces to the
/// login page, everything else gets a terse 401.
fn deny(path: &str, reason: DenyReason) -> Response {
    if path == "/" {
        return (StatusCode::FOUND, [(header::LOCATION, "/login")]).into_response();
    }
    (
        StatusCode::UNAUTHORIZED,
        format!("401 {}", reason.as_str()),
    )
        .into_response()
}

/// Best-effort backend session termination. Never awaited on the
/// response path; its own failure is only logged.
fn end_session(state: &AppState, headers: HeaderMap, client_info: ClientInfo) {
    let forwarder: Arc<Forwarder> = state.forwarder.clone();
    let bound = Duration::from_secs(state.config.timeouts.session_end_secs);

    tokio::spawn(async move {
        let proxy_req = ProxyRequest::new(Method::DELETE, "/auth/session");
        let result =
            tokio::time::timeout(bound, forwarder.send(proxy_req, &headers, &client_info)).await;
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Session termination call failed");
            }
            Err(_) => {
                tracing::warn!("Session termination call timed out");
            }
        }
    });
}

/// Extract the `token` cookie value, percent-decoded.
pub fn token_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        if let Some(value) = pair.trim().strip_prefix("token=") {
            return Some(percent_decode_str(value).decode_utf8_lossy().into_owned());
        }
    }
    None
}

/// Host the client addressed, from the Host header or HTTP/2 authority.
pub fn request_host(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Drop an explicit port, keeping IPv6 brackets intact.
pub fn strip_port(host: &str) -> &str {
    if let Some(end) = host.rfind(']') {
        return &host[..=end];
    }
    match host.rfind(':') {
        Some(colon) => &host[..colon],
        None => host,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
