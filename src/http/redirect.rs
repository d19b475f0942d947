//! Plaintext redirect listener.
//!
//! # Responsibilities
//! - Pass ACME HTTP-01 challenges through to the backend so certificates
//!   can be provisioned before any TLS material exists
//! - Forward health checks with the minimal gateway header set
//! - Permanently redirect everything else to the HTTPS listener
//!
//! # Design Decisions
//! - Completely independent of the dispatcher: no routes, no auth
//! - Shares the forwarder (and its connection pool) with the main
//!   listener

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::dispatch::{request_host, strip_port};
use crate::http::forward::{sanitize_param, ClientInfo, Forwarder};

const ACME_PREFIX: &str = "/.well-known/acme-challenge/";

#[derive(Clone)]
struct PlainState {
    config: Arc<GatewayConfig>,
    forwarder: Arc<Forwarder>,
}

/// The plain-HTTP listener answering on port 80.
pub struct RedirectServer {
    router: Router,
}

impl RedirectServer {
    pub fn new(config: Arc<GatewayConfig>, forwarder: Arc<Forwarder>) -> Self {
        let state = PlainState { config, forwarder };
        let router = Router::new().fallback(handle).with_state(state);
        Self { router }
    }

    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP redirect server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).await
    }
}

async fn handle(
    State(state): State<PlainState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path();

    if let Some(rest) = path.strip_prefix(ACME_PREFIX) {
        // Only the final segment is a challenge token.
        let token = sanitize_param(rest.rsplit('/').next().unwrap_or(""), 128);
        return match state
            .forwarder
            .fetch_raw(&format!("{ACME_PREFIX}{token}"))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "ACME challenge relay failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500 Internal Server Error",
                )
                    .into_response()
            }
        };
    }

    if path.starts_with("/check") || path.starts_with("/ping") {
        let client_info = ClientInfo {
            host: request_host(&request),
            remote_ip: addr.ip().to_string(),
        };
        return match state.forwarder.check(request.headers(), &client_info).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "Health check relay failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500 Internal Server Error",
                )
                    .into_response()
            }
        };
    }

    redirect_to_https(&state.config, &request)
}

/// 301 to the TLS listener, omitting the port when it is the default.
fn redirect_to_https(config: &GatewayConfig, request: &Request<Body>) -> Response {
    let host = request_host(request);
    let host = strip_port(&host);
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let proxied = config
        .proxy
        .marker_header
        .as_deref()
        .and_then(|name| request.headers().get(name))
        .is_some();

    let location = if proxied {
        // A fronting proxy terminates TLS on the default port.
        format!("https://{host}{path_and_query}")
    } else {
        let scheme = config.scheme();
        let port = config.listener.bind_port;
        if port == 443 {
            format!("{scheme}://{host}{path_and_query}")
        } else {
            format!("{scheme}://{host}:{port}{path_and_query}")
        }
    };

    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}
