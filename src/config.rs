//! Configuration for Portcullis
//!
//! CLI arguments and environment variable handling using clap. `Args` is the
//! raw surface; `GatewayConfig` is the validated, immutable value every
//! component receives behind an `Arc`.

use clap::Parser;
use hyper::Uri;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::auth::password::PasswordHashKind;
use crate::types::{GatewayError, Result};

/// Length of a generated session secret in bytes
pub const GENERATED_SECRET_LEN: usize = 32;

/// Portcullis - login gate in front of an HTTP application
#[derive(Parser, Clone)]
#[command(name = "portcullis")]
#[command(about = "Session-gated reverse proxy for a single upstream application")]
#[command(version)]
pub struct Args {
    /// Username accepted at the login page
    #[arg(short = 'u', long, env = "AUTH_PROXY_USERNAME")]
    pub username: String,

    /// Plaintext password (ignored when a password hash is set)
    #[arg(short = 'p', long, env = "AUTH_PROXY_PASSWORD")]
    pub password: Option<String>,

    /// Argon2 PHC or bcrypt hash of the password (takes precedence)
    #[arg(long, env = "AUTH_PROXY_PASSWORD_HASH")]
    pub password_hash: Option<String>,

    /// Upstream application base URL
    #[arg(short = 't', long, env = "AUTH_PROXY_TARGET")]
    pub target: String,

    /// Secret used to seal session cookies.
    /// When absent a random secret is generated and every restart logs all users out.
    #[arg(long, env = "AUTH_PROXY_COOKIE_SECRET")]
    pub cookie_secret: Option<String>,

    /// Title shown on the login page
    #[arg(long, env = "AUTH_PROXY_LOGIN_TITLE", default_value = "Auth Proxy")]
    pub login_title: String,

    /// Port to listen on
    #[arg(long, env = "AUTH_PROXY_PORT", default_value = "8080")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "AUTH_PROXY_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Session lifetime in seconds (default 7 days)
    #[arg(long, env = "AUTH_PROXY_SESSION_MAX_AGE_SECS", default_value = "604800")]
    pub session_max_age_secs: u64,

    /// Mark the session cookie Secure (enable behind HTTPS)
    #[arg(long, env = "AUTH_PROXY_COOKIE_SECURE", default_value = "false")]
    pub cookie_secure: bool,

    /// Directory served under /static/ (login page assets)
    #[arg(long, env = "AUTH_PROXY_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Upstream connect timeout in milliseconds
    #[arg(long, env = "AUTH_PROXY_UPSTREAM_CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub upstream_connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AUTH_PROXY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "AUTH_PROXY_LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

/// The authoritative password form
pub enum Credential {
    Plaintext(Zeroizing<String>),
    Hash {
        kind: PasswordHashKind,
        hash: Zeroizing<String>,
    },
}

impl Credential {
    /// Short label for logs
    pub fn mode(&self) -> &'static str {
        match self {
            Credential::Plaintext(_) => "plaintext",
            Credential::Hash { kind, .. } => kind.label(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({}, <redacted>)", self.mode())
    }
}

/// Key material for sealing session tokens
pub struct SessionSecret {
    bytes: Zeroizing<Vec<u8>>,
    generated: bool,
}

impl SessionSecret {
    pub fn from_configured(secret: &str) -> Self {
        Self {
            bytes: Zeroizing::new(secret.as_bytes().to_vec()),
            generated: false,
        }
    }

    pub fn generate() -> Self {
        let mut bytes = vec![0u8; GENERATED_SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self {
            bytes: Zeroizing::new(bytes),
            generated: true,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the secret was generated at startup rather than configured
    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSecret")
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

/// Validated gateway configuration, read-only after startup
#[derive(Debug)]
pub struct GatewayConfig {
    pub username: String,
    pub credential: Credential,
    pub target: Uri,
    pub session_secret: SessionSecret,
    pub session_max_age: Duration,
    pub login_title: String,
    pub cookie_secure: bool,
    pub listen: SocketAddr,
    pub static_dir: Option<PathBuf>,
    pub upstream_connect_timeout: Duration,
}

impl GatewayConfig {
    /// Validate raw arguments into the runtime configuration
    pub fn from_args(args: Args) -> Result<Self> {
        let username = args.username.trim().to_string();
        if username.is_empty() {
            return Err(GatewayError::Config(
                "AUTH_PROXY_USERNAME is required".to_string(),
            ));
        }

        let credential = resolve_credential(args.password, args.password_hash)?;
        let target = parse_target(&args.target)?;

        let session_secret = match args.cookie_secret.filter(|s| !s.is_empty()) {
            Some(secret) => SessionSecret::from_configured(&secret),
            None => SessionSecret::generate(),
        };

        if args.session_max_age_secs == 0 {
            return Err(GatewayError::Config(
                "AUTH_PROXY_SESSION_MAX_AGE_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            username,
            credential,
            target,
            session_secret,
            session_max_age: Duration::from_secs(args.session_max_age_secs),
            login_title: args.login_title,
            cookie_secure: args.cookie_secure,
            listen: SocketAddr::new(args.bind, args.port),
            static_dir: args.static_dir,
            upstream_connect_timeout: Duration::from_millis(args.upstream_connect_timeout_ms),
        })
    }
}

/// Hash wins over plaintext; at least one must be present
fn resolve_credential(password: Option<String>, password_hash: Option<String>) -> Result<Credential> {
    if let Some(hash) = password_hash.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
        let kind = PasswordHashKind::detect(&hash)?;
        return Ok(Credential::Hash {
            kind,
            hash: Zeroizing::new(hash),
        });
    }

    match password.filter(|p| !p.is_empty()) {
        Some(password) => Ok(Credential::Plaintext(Zeroizing::new(password))),
        None => Err(GatewayError::Config(
            "Either AUTH_PROXY_PASSWORD or AUTH_PROXY_PASSWORD_HASH is required".to_string(),
        )),
    }
}

fn parse_target(raw: &str) -> Result<Uri> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GatewayError::Config("AUTH_PROXY_TARGET is required".to_string()));
    }

    let uri: Uri = raw
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid target URL {raw:?}: {e}")))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(GatewayError::Config(format!(
                "invalid target URL {raw:?}: scheme must be http or https"
            )))
        }
    }

    if uri.authority().is_none() {
        return Err(GatewayError::Config(format!(
            "invalid target URL {raw:?}: missing host"
        )));
    }

    Ok(uri)
}
