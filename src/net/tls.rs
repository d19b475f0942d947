//! TLS configuration from decoded certificate material.

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsMaterial;

/// Build the rustls server config from PEM bytes.
///
/// The material was parsed once at startup by the config loader, so a
/// failure here means it changed out from under us and is fatal.
pub async fn build(material: &TlsMaterial) -> Result<RustlsConfig, std::io::Error> {
    RustlsConfig::from_pem(material.cert_pem.clone(), material.key_pem.clone()).await
}
