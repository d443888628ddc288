//! Stateless sessions for Portcullis
//!
//! Provides:
//! - Sealed session tokens (ChaCha20-Poly1305, key derived from the cookie secret)
//! - Cookie issue / revoke / lookup for the `auth-session` cookie

pub mod codec;
pub mod manager;

pub use codec::{unix_now, InvalidSession, Session, SessionCodec, SESSION_COOKIE_NAME};
pub use manager::{session_cookie_values, SessionManager};
