//! Session token codec.
//!
//! Wire format: `base64url( nonce[24] || aead_ciphertext )` where the
//! ciphertext is the JSON payload `{"id": ..., "ttl": ...}` sealed with
//! XChaCha20-Poly1305 under the 32-byte pre-shared key. Every field is
//! untrusted until the authentication tag verifies.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nonce length of the token AEAD.
pub const NONCE_LEN: usize = 24;

/// Length of the pre-shared symmetric key.
pub const KEY_LEN: usize = 32;

/// The 32-byte pre-shared session key.
#[derive(Clone)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Decrypted session token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque session id assigned by the backend.
    pub id: String,

    /// Absolute expiry, unix seconds.
    #[serde(rename = "ttl")]
    pub expires_at: i64,
}

/// Errors that can occur while decoding a token cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The cookie value was not valid URL-safe base64.
    #[error("token: invalid transport encoding")]
    InvalidEncoding,

    /// The decoded blob is too short to hold a nonce and ciphertext.
    #[error("token: truncated token blob")]
    Malformed,

    /// The authentication tag did not verify. A forged, corrupted, or
    /// wrong-key token all land here.
    #[error("token: decryption failed")]
    DecryptionFailed,

    /// The decrypted payload was not a well-formed token.
    #[error("token: malformed payload")]
    MalformedPayload,
}

/// Decode and authenticate a token cookie value.
pub fn decode(key: &SessionKey, cookie: &str) -> Result<Token, TokenError> {
    let blob = URL_SAFE
        .decode(cookie)
        .map_err(|_| TokenError::InvalidEncoding)?;

    if blob.len() <= NONCE_LEN {
        return Err(TokenError::Malformed);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| TokenError::DecryptionFailed)?;

    let token: Token =
        serde_json::from_slice(&plaintext).map_err(|_| TokenError::MalformedPayload)?;
    if token.id.is_empty() {
        return Err(TokenError::MalformedPayload);
    }

    Ok(token)
}

/// Seal a token into a cookie value with a fresh random nonce.
///
/// The serving path never mints tokens; this exists for tests and local
/// tooling that need issuer parity with the backend.
pub fn seal(key: &SessionKey, token: &Token) -> String {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let payload = serde_json::to_vec(token).expect("token payload serializes");
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), payload.as_slice())
        .expect("aead seal");

    let mut blob = nonce.to_vec();
    blob.extend_from_slice(&ciphertext);
    URL_SAFE.encode(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::from_bytes([42u8; KEY_LEN])
    }

    fn sample() -> Token {
        Token {
            id: "5c2e8f1b".to_string(),
            expires_at: 1_900_000_000,
        }
    }

    #[test]
    fn test_seal_then_decode() {
        let cookie = seal(&key(), &sample());
        let token = decode(&key(), &cookie).unwrap();
        assert_eq!(token, sample());
    }

    #[test]
    fn test_bad_base64() {
        assert_eq!(
            decode(&key(), "%%not-base64%%"),
            Err(TokenError::InvalidEncoding)
        );
    }

    #[test]
    fn test_truncated_blob() {
        let short = URL_SAFE.encode([0u8; NONCE_LEN]);
        assert_eq!(decode(&key(), &short), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_key_fails() {
        let cookie = seal(&key(), &sample());
        let other = SessionKey::from_bytes([43u8; KEY_LEN]);
        assert_eq!(decode(&other, &cookie), Err(TokenError::DecryptionFailed));
    }

    #[test]
    fn test_any_flipped_bit_fails() {
        let cookie = seal(&key(), &sample());
        let blob = URL_SAFE.decode(&cookie).unwrap();

        // Flip one bit in every byte position, nonce and ciphertext alike.
        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let tampered = URL_SAFE.encode(&tampered);
            assert_eq!(
                decode(&key(), &tampered),
                Err(TokenError::DecryptionFailed),
                "byte {i} tamper must not verify"
            );
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        let token = Token {
            id: String::new(),
            expires_at: 1_900_000_000,
        };
        let cookie = seal(&key(), &token);
        assert_eq!(decode(&key(), &cookie), Err(TokenError::MalformedPayload));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let k = key();
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&[42u8; KEY_LEN]));
        let nonce = [9u8; NONCE_LEN];
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), b"not json".as_slice())
            .unwrap();
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        let cookie = URL_SAFE.encode(blob);
        assert_eq!(decode(&k, &cookie), Err(TokenError::MalformedPayload));
    }
}
