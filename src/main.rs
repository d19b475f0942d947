use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use web_gateway::config::loader;
use web_gateway::http::{Forwarder, GatewayServer, RedirectServer};
use web_gateway::net;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "web_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match loader::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        bind_host = %config.listener.bind_host,
        bind_port = config.listener.bind_port,
        internal_address = %config.backend.internal_addr,
        scheme = config.scheme(),
        strict = config.session.strict,
        "Configuration loaded"
    );

    let forwarder = Arc::new(Forwarder::new(&config));

    if config.redirect.enabled && config.listener.bind_port != config.redirect.bind_port {
        let redirect = RedirectServer::new(config.clone(), forwarder.clone());
        let bind = (
            config.listener.bind_host.clone(),
            config.redirect.bind_port,
        );
        tokio::spawn(async move {
            tracing::info!(port = bind.1, "Starting HTTP redirect server");
            match TcpListener::bind((bind.0.as_str(), bind.1)).await {
                Ok(listener) => {
                    if let Err(err) = redirect.run(listener).await {
                        tracing::error!(error = %err, "Redirect server error");
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Redirect server bind error");
                }
            }
        });
    }

    let server = GatewayServer::new(config.clone(), forwarder);
    let bind = (
        config.listener.bind_host.as_str(),
        config.listener.bind_port,
    );

    let result = match &config.listener.tls {
        Some(material) => {
            let tls = match net::tls::build(material).await {
                Ok(tls) => tls,
                Err(err) => {
                    tracing::error!(error = %err, "Server TLS material error");
                    std::process::exit(1);
                }
            };
            let listener = match std::net::TcpListener::bind(bind)
                .and_then(|l| l.set_nonblocking(true).map(|_| l))
            {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!(error = %err, "Server bind error");
                    std::process::exit(1);
                }
            };
            server.run_tls(listener, tls).await
        }
        None => {
            let listener = match TcpListener::bind(bind).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!(error = %err, "Server bind error");
                    std::process::exit(1);
                }
            };
            server.run(listener).await
        }
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "Server error");
        std::process::exit(1);
    }
}
