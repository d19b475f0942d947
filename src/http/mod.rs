//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware layers)
//!     → dispatch.rs (redirect check, route lookup, auth policy)
//!     → forward.rs (build backend request, relay response)
//!     → Send to client
//!
//! Plaintext port:
//!     → redirect.rs (ACME passthrough, health forward, 301)
//! ```

pub mod dispatch;
pub mod forward;
pub mod redirect;
pub mod server;

pub use forward::{Forwarder, GatewayError};
pub use redirect::RedirectServer;
pub use server::{AppState, GatewayServer};
