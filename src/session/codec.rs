//! Sealed, client-held session tokens
//!
//! A token is `version || nonce || ChaCha20-Poly1305(json(Session))`, encoded
//! as URL-safe base64 without padding so it can travel as a cookie value.
//! The expiry lives inside the sealed payload, so the holder cannot extend
//! it, and any modified byte fails authentication.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, Key, KeyInit, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::types::{GatewayError, Result};

/// Cookie carrying the session token; also bound into every token as AAD
pub const SESSION_COOKIE_NAME: &str = "auth-session";

const TOKEN_VERSION: u8 = 1;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Tolerated clock drift for tokens issued "in the future"
const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// One authenticated browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub authenticated: bool,
    /// Unix seconds
    pub issued_at: u64,
    /// Unix seconds
    pub expires_at: u64,
}

impl Session {
    /// A fresh authenticated session valid for `max_age` from `now`
    pub fn authenticated(username: impl Into<String>, now: u64, max_age: Duration) -> Self {
        Self {
            username: username.into(),
            authenticated: true,
            issued_at: now,
            expires_at: now.saturating_add(max_age.as_secs()),
        }
    }

    /// A logged-out record that is already expired
    pub fn revoked(username: impl Into<String>, now: u64) -> Self {
        Self {
            username: username.into(),
            authenticated: false,
            issued_at: now,
            expires_at: now,
        }
    }
}

/// Why a token was refused. Only used for debug logging; every variant
/// means "no session" to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSession {
    #[error("malformed session token")]
    Malformed,
    #[error("session token failed authentication")]
    Tampered,
    #[error("session expired")]
    Expired,
}

/// Seals and opens session tokens with a key derived from the configured secret
pub struct SessionCodec {
    cipher: ChaCha20Poly1305,
    max_age: Duration,
}

impl SessionCodec {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&Sha256::digest(secret));

        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_slice())),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Seal a session into a cookie-safe token
    pub fn encode(&self, session: &Session) -> Result<String> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(session)
                .map_err(|e| GatewayError::Session(format!("Failed to serialize session: {e}")))?,
        );

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: SESSION_COOKIE_NAME.as_bytes(),
                },
            )
            .map_err(|e| GatewayError::Session(format!("Encryption failed: {e}")))?;

        let mut token = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Open a token, checking integrity and expiry against the current time
    pub fn decode(&self, token: &str) -> std::result::Result<Session, InvalidSession> {
        self.decode_at(token, unix_now())
    }

    /// Open a token as of `now` (unix seconds)
    pub fn decode_at(&self, token: &str, now: u64) -> std::result::Result<Session, InvalidSession> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| InvalidSession::Malformed)?;

        if bytes.len() < 1 + NONCE_LEN + AUTH_TAG_LEN || bytes[0] != TOKEN_VERSION {
            return Err(InvalidSession::Malformed);
        }

        let (nonce, ciphertext) = bytes[1..].split_at(NONCE_LEN);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: SESSION_COOKIE_NAME.as_bytes(),
                    },
                )
                .map_err(|_| InvalidSession::Tampered)?,
        );

        let session: Session =
            serde_json::from_slice(&plaintext).map_err(|_| InvalidSession::Malformed)?;

        if session.issued_at > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(InvalidSession::Malformed);
        }

        // The configured lifetime bounds old tokens even if it was shortened since issue
        if now >= session.expires_at
            || now.saturating_sub(session.issued_at) >= self.max_age.as_secs()
        {
            return Err(InvalidSession::Expired);
        }

        Ok(session)
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
