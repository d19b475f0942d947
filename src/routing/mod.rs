//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → table.rs (scan entries, extract parameters)
//!     → route.rs (pattern matching, specificity scoring)
//!     → Return: RouteMatch or no-match (404)
//!
//! Table compilation (at startup):
//!     declarative entries
//!     → parse patterns into segments
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - The whole external surface is data: one entry per route, one
//!   forwarding algorithm in `http::forward`
//! - No regex; segment comparison only
//! - Literal segments outrank placeholders, placeholders outrank tails,
//!   so overlapping patterns resolve deterministically

pub mod payloads;
pub mod route;
pub mod table;

pub use payloads::BodySchema;
pub use route::{Access, QueryPolicy, RouteAction, RouteEntry};
pub use table::{RouteMatch, RouteTable};
