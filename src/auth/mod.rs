//! Authentication for Portcullis
//!
//! Provides:
//! - Password hashing with Argon2 (bcrypt hashes accepted for verification)
//! - Credential validation against the configured account
//! - The authentication gate that guards the forwarder

pub mod credentials;
pub mod gate;
pub mod password;

pub use credentials::CredentialValidator;
pub use gate::{
    login_redirect_location, sanitize_redirect, AuthGate, GateDecision, LOGIN_PATH, LOGOUT_PATH,
    STATIC_PREFIX,
};
pub use password::{hash_password, hash_password_bcrypt, verify_password, PasswordHashKind};
