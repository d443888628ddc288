//! Shared error and result types

use bytes::Bytes;
use thiserror::Error;

/// Error carried by response bodies (local or streamed from upstream)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body shared by every handler
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, BoxError>;

/// Errors raised anywhere in the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid settings, fatal before the listener starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Password hashing or verification failure (not a wrong password)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Session token could not be sealed or written
    #[error("Session error: {0}")]
    Session(String),

    /// Upstream application unreachable or failed mid-request
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Malformed inbound request
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
