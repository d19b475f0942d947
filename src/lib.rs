//! Authenticating web gateway for an internal management API.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────┐
//!                      │                 GATEWAY                     │
//!                      │                                             │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌─────────┐  │
//!   ──────────────────▶│  │  http   │──▶│ dispatch │──▶│ routing │  │
//!   (HTTPS, cookie)    │  │ server  │   │          │   │  table  │  │
//!                      │  └─────────┘   └────┬─────┘   └─────────┘  │
//!                      │                     │                      │
//!                      │               ┌─────▼─────┐                │
//!                      │               │   auth    │                │
//!                      │               │ verifier  │                │
//!                      │               └─────┬─────┘                │
//!                      │                     │                      │
//!   Client Response    │  ┌─────────┐   ┌────▼─────┐                │
//!   ◀──────────────────│  │ stream  │◀──│ forward  │◀───────────────┼── Backend
//!                      │  │  relay  │   │          │   plain HTTP   │   (internal)
//!                      │  └─────────┘   └──────────┘                │
//!                      │                                             │
//!                      │  ┌────────────────────────────────────────┐ │
//!                      │  │ redirect listener: ACME passthrough,    │ │
//!                      │  │ health forward, HTTP→HTTPS 301          │ │
//!                      │  └────────────────────────────────────────┘ │
//!                      └────────────────────────────────────────────┘
//! ```
//!
//! The gateway verifies an encrypted session cookie, reconstructs the
//! backend path from validated route parameters, copies an explicit
//! header allow-list, and streams the backend's response back. It never
//! interprets payload semantics, caches, retries, or balances.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod auth;

pub use config::GatewayConfig;
pub use http::{Forwarder, GatewayServer, RedirectServer};
pub use routing::RouteTable;
