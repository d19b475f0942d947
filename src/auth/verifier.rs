//! Token verification state machine.
//!
//! # Responsibilities
//! - Apply the codec to the inbound cookie
//! - Enforce the expiry window (past and far-future bounds)
//! - Apply strict-mode policy for missing cookies
//!
//! # Design Decisions
//! - `now` is a parameter so tests pin time exactly
//! - A missing key fails closed: any presented token is rejected
//! - The verifier never talks to the network; the caller owns the
//!   session-termination side effect

use crate::auth::token::{self, SessionKey, TokenError};

/// Upper bound on how far in the future a token expiry may sit.
/// Anything beyond this is treated as forged or clock-skewed.
pub const MAX_FUTURE_SECS: i64 = 730 * 3600;

/// Why a request was left unvalidated. Rendered to clients as a short
/// stable string; details never leave the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    DecodeFailure,
    DecryptFailure,
    MalformedPayload,
    Expired,
    FutureDated,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing token",
            DenyReason::DecodeFailure => "decode failure",
            DenyReason::DecryptFailure => "decrypt failure",
            DenyReason::MalformedPayload => "malformed payload",
            DenyReason::Expired => "expired",
            DenyReason::FutureDated => "future-dated",
        }
    }
}

/// Outcome of verifying one request. Computed fresh every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The token decrypted and sits inside its validity window.
    Validated { id: String },

    /// No valid token. A `reason` means the request must be rejected
    /// (and the session terminated server-side); `None` means strict
    /// mode is off and no cookie was presented, so the request proceeds
    /// for the backend's own auth to judge.
    Unvalidated { reason: Option<DenyReason> },
}

impl Verdict {
    fn denied(reason: DenyReason) -> Self {
        Verdict::Unvalidated {
            reason: Some(reason),
        }
    }
}

/// Per-process verifier; holds the key and the strict-mode flag.
#[derive(Debug, Clone)]
pub struct Verifier {
    key: Option<SessionKey>,
    strict: bool,
}

impl Verifier {
    pub fn new(key: Option<SessionKey>, strict: bool) -> Self {
        Self { key, strict }
    }

    /// Run the verification state machine for one request.
    ///
    /// `now` is unix seconds.
    pub fn verify(&self, cookie: Option<&str>, now: i64) -> Verdict {
        let cookie = match cookie {
            Some(c) => c,
            None => {
                if self.strict {
                    return Verdict::denied(DenyReason::MissingToken);
                }
                return Verdict::Unvalidated { reason: None };
            }
        };

        // A configured key is required to accept any token at all.
        let key = match &self.key {
            Some(k) => k,
            None => return Verdict::denied(DenyReason::DecryptFailure),
        };

        let token = match token::decode(key, cookie) {
            Ok(t) => t,
            Err(TokenError::InvalidEncoding) | Err(TokenError::Malformed) => {
                return Verdict::denied(DenyReason::DecodeFailure);
            }
            Err(TokenError::DecryptionFailed) => {
                return Verdict::denied(DenyReason::DecryptFailure);
            }
            Err(TokenError::MalformedPayload) => {
                return Verdict::denied(DenyReason::MalformedPayload);
            }
        };

        if token.expires_at > now + MAX_FUTURE_SECS {
            return Verdict::denied(DenyReason::FutureDated);
        }
        if token.expires_at <= now {
            return Verdict::denied(DenyReason::Expired);
        }

        Verdict::Validated { id: token.id }
    }
}
