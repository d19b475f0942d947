//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the Axum router and middleware stack
//! - Share immutable state (config, routes, verifier, client) per request
//! - Serve plain HTTP or TLS depending on configured material
//!
//! # Design Decisions
//! - The body-size ceiling sits in the layer stack, before any handler
//! - A panic anywhere inside a request maps to the fixed 510 status and
//!   never takes the listener down
//! - Request timeout defaults to a two-minute budget

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{SessionKey, Verifier};
use crate::config::GatewayConfig;
use crate::http::dispatch;
use crate::http::forward::Forwarder;
use crate::routing::RouteTable;

/// Immutable application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub routes: Arc<RouteTable>,
    pub verifier: Arc<Verifier>,
    pub forwarder: Arc<Forwarder>,
}

/// The main gateway listener.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: Arc<GatewayConfig>, forwarder: Arc<Forwarder>) -> Self {
        let key = config.session.secret.map(SessionKey::from_bytes);
        let state = AppState {
            routes: Arc::new(RouteTable::standard()),
            verifier: Arc::new(Verifier::new(key, config.session.strict)),
            forwarder,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers. Outermost
    /// first: tracing, the panic boundary, the request timeout, then the
    /// body ceiling, so oversized payloads die before any handler runs.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch::handle)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::custom(internal_irrecoverable))
                    .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Serve plain HTTP on an already-bound listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve TLS on an already-bound listener.
    pub async fn run_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener, tls).serve(app).await
    }
}

/// Map a recovered panic to the fixed non-standard status the original
/// served, keeping the listener alive for everything else in flight.
fn internal_irrecoverable(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(detail, "Recovered panic in request handler");

    (StatusCode::NOT_EXTENDED, "510 Not Extended").into_response()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
