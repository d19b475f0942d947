//! Configuration schema definitions.
//!
//! The whole tree is populated by `loader::from_env` and never mutated
//! afterwards; handlers receive it behind an `Arc`.

use std::fmt;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Reverse-proxy header names announced by an upstream LB, if any.
    pub proxy: ReverseProxyConfig,

    /// Internal backend address.
    pub backend: BackendConfig,

    /// Session token verification settings.
    pub session: SessionConfig,

    /// Plaintext redirect listener settings.
    pub redirect: RedirectConfig,

    /// Request size ceilings.
    pub limits: LimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl GatewayConfig {
    /// Externally observed scheme of the main listener.
    pub fn scheme(&self) -> &'static str {
        if self.listener.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// Main listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind host (e.g. "0.0.0.0").
    pub bind_host: String,

    /// Bind port for the main listener.
    pub bind_port: u16,

    /// TLS material; `None` serves plain HTTP.
    pub tls: Option<TlsMaterial>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 443,
            tls: None,
        }
    }
}

/// Decoded PEM certificate and key for the main listener.
#[derive(Clone)]
pub struct TlsMaterial {
    /// Certificate chain, PEM bytes.
    pub cert_pem: Vec<u8>,

    /// Private key, PEM bytes.
    pub key_pem: Vec<u8>,
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem", &self.cert_pem.len())
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Header names set by an upstream reverse proxy, when one fronts the
/// gateway. Empty env vars leave these as `None` and disable the related
/// behavior.
#[derive(Debug, Clone, Default)]
pub struct ReverseProxyConfig {
    /// Marker header whose presence identifies proxied requests.
    pub marker_header: Option<String>,

    /// Header carrying the original scheme ("http"/"https").
    pub proto_header: Option<String>,
}

/// Internal backend address.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// `host:port` of the management API, reached over plain HTTP.
    pub internal_addr: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            internal_addr: "127.0.0.1:9700".to_string(),
        }
    }
}

/// Session token settings.
#[derive(Clone)]
pub struct SessionConfig {
    /// 32-byte pre-shared key for the token AEAD; `None` makes every
    /// presented token fail verification.
    pub secret: Option<[u8; 32]>,

    /// Strict mode: require a valid token on every protected route.
    /// When off, a missing cookie passes through for the backend's
    /// API-key auth to decide.
    pub strict: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            strict: true,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &self.secret.map(|_| "<redacted>"))
            .field("strict", &self.strict)
            .finish()
    }
}

/// Plaintext redirect listener settings.
#[derive(Debug, Clone)]
pub struct RedirectConfig {
    /// Enable the plaintext listener. Ignored when the main listener
    /// already binds the plaintext port.
    pub enabled: bool,

    /// Port for the plaintext listener.
    pub bind_port: u16,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_port: 80,
        }
    }
}

/// Request size ceilings.
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Maximum inbound body size in bytes, enforced before handler logic.
    pub max_body_bytes: usize,

    /// Maximum decoded length of a single path parameter in bytes.
    pub max_param_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 50_000,
            max_param_bytes: 128,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Total time budget for an inbound request.
    pub request_secs: u64,

    /// Bound on a single backend call.
    pub upstream_secs: u64,

    /// Bound on the fire-and-forget session termination call.
    pub session_end_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 120,
            upstream_secs: 120,
            session_end_secs: 10,
        }
    }
}
