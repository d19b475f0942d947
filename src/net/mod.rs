//! Network layer subsystem.
//!
//! # Design Decisions
//! - TLS material arrives pre-validated from config; this layer only
//!   turns it into a rustls server config

pub mod tls;
