//! Configuration loading from the process environment.
//!
//! Mirrors the deployment contract: everything arrives as environment
//! variables, is decoded and checked here, and any failure aborts startup.

use std::env;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, TlsMaterial};

/// Error type for configuration loading. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `WEB_SECRET` was not valid base64.
    #[error("config: failed to decode session secret")]
    BadSecretEncoding,

    /// `WEB_SECRET` decoded to the wrong key length.
    #[error("config: session secret must decode to 32 bytes, got {0}")]
    BadSecretLength(usize),

    /// A bind port env var did not parse.
    #[error("config: invalid port in {var}: {value}")]
    BadPort { var: &'static str, value: String },

    /// TLS material was present but unusable.
    #[error("config: {0}")]
    BadTlsMaterial(String),

    /// Only one of `SSL_CERT`/`SSL_KEY` was provided.
    #[error("config: SSL_CERT and SSL_KEY must be set together")]
    PartialTlsMaterial,
}

/// Build the gateway configuration from the environment.
pub fn from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();

    if let Some(host) = non_empty(env::var("BIND_HOST").ok()) {
        config.listener.bind_host = host;
    }
    if let Some(port) = non_empty(env::var("BIND_PORT").ok()) {
        config.listener.bind_port = port.parse().map_err(|_| ConfigError::BadPort {
            var: "BIND_PORT",
            value: port,
        })?;
    }
    if let Some(addr) = non_empty(env::var("INTERNAL_ADDRESS").ok()) {
        config.backend.internal_addr = addr;
    }

    config.proxy.marker_header = non_empty(env::var("REVERSE_PROXY_HEADER").ok());
    config.proxy.proto_header = non_empty(env::var("REVERSE_PROXY_PROTO_HEADER").ok());

    config.redirect.enabled = env::var("REDIRECT_SERVER").ok().as_deref() == Some("true");

    // Strict unless explicitly disabled.
    config.session.strict = env::var("WEB_STRICT").ok().as_deref() != Some("false");

    if let Some(secret) = non_empty(env::var("WEB_SECRET").ok()) {
        config.session.secret = Some(decode_secret(&secret)?);
    }

    let cert = non_empty(env::var("SSL_CERT").ok());
    let key = non_empty(env::var("SSL_KEY").ok());
    config.listener.tls = match (cert, key) {
        (Some(cert), Some(key)) => Some(load_tls_material(&cert, &key)?),
        (None, None) => None,
        _ => return Err(ConfigError::PartialTlsMaterial),
    };

    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Decode the standard-base64 session secret into a 32-byte key.
pub fn decode_secret(encoded: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ConfigError::BadSecretEncoding)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ConfigError::BadSecretLength(len))
}

/// Resolve cert/key env values into PEM bytes. Each value is either a
/// filesystem path or a standard-base64 PEM blob.
fn load_tls_material(cert: &str, key: &str) -> Result<TlsMaterial, ConfigError> {
    let cert_pem = read_pem(cert, "certificate")?;
    let key_pem = read_pem(key, "private key")?;

    // Parse up front so bad material fails at startup, not at the first
    // TLS handshake.
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::BadTlsMaterial(format!("unreadable certificate: {e}")))?;
    if certs.is_empty() {
        return Err(ConfigError::BadTlsMaterial(
            "certificate contains no PEM certificates".to_string(),
        ));
    }
    rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(|e| ConfigError::BadTlsMaterial(format!("unreadable private key: {e}")))?
        .ok_or_else(|| {
            ConfigError::BadTlsMaterial("no private key found in key material".to_string())
        })?;

    Ok(TlsMaterial { cert_pem, key_pem })
}

fn read_pem(value: &str, what: &str) -> Result<Vec<u8>, ConfigError> {
    if Path::new(value).is_file() {
        return std::fs::read(value)
            .map_err(|e| ConfigError::BadTlsMaterial(format!("failed to read {what}: {e}")));
    }
    STANDARD
        .decode(value)
        .map_err(|_| ConfigError::BadTlsMaterial(format!("failed to decode {what} base64")))
}
