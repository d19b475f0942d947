//! Session authentication subsystem.
//!
//! # Data Flow
//! ```text
//! token cookie (URL-safe base64)
//!     → token.rs (decode blob, AEAD open, parse payload)
//!     → verifier.rs (expiry window checks, strict-mode policy)
//!     → Verdict consumed by the dispatcher
//! ```
//!
//! # Design Decisions
//! - Tokens are issued by the backend; the gateway only verifies
//! - Tampering and wrong-key failures are indistinguishable by design
//! - Verdicts are computed fresh per request, never cached

pub mod token;
pub mod verifier;

pub use token::{SessionKey, Token, TokenError};
pub use verifier::{DenyReason, Verdict, Verifier};
