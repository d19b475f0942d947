//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (read, decode, semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is read exactly once at startup; there is no reload path
//! - Secret and TLS decoding failures are fatal before the first bind
//! - Request handling only ever sees `Arc<GatewayConfig>`

pub mod loader;
pub mod schema;

pub use loader::ConfigError;
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::TlsMaterial;
