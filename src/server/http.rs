//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};

use crate::auth::{
    AuthGate, CredentialValidator, GateDecision, LOGIN_PATH, LOGOUT_PATH, STATIC_PREFIX,
};
use crate::config::GatewayConfig;
use crate::proxy::Forwarder;
use crate::routes::{self, redirect_response, LoginPage};
use crate::session::SessionManager;
use crate::types::{BoxBody, Result};

/// Shared application state
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Checks submitted username/password against the configured account
    pub credentials: CredentialValidator,
    /// Issues, revokes and reads session cookies
    pub sessions: Arc<SessionManager>,
    /// Decides whether a request may reach the upstream
    pub gate: AuthGate,
    /// Streams authenticated traffic to the target
    pub forwarder: Forwarder,
    pub login_page: LoginPage,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionManager::new(&config));

        Ok(Self {
            credentials: CredentialValidator::new(Arc::clone(&config)),
            gate: AuthGate::new(Arc::clone(&sessions)),
            forwarder: Forwarder::new(&config)?,
            login_page: LoginPage::new(config.login_title.clone()),
            sessions,
            config,
        })
    }
}

/// Bind the configured address and serve until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.config.listen).await?;
    serve(listener, state).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let local_addr = listener.local_addr()?;
    info!(
        "Portcullis listening on {}, forwarding to {}",
        local_addr, state.config.target
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
                let backoff = accept_error_backoff(&e);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// How long to pause after a failed accept.
///
/// A peer that gave up before the handshake finished is harmless. Anything
/// else (usually descriptor exhaustion) fails again immediately, so wait for
/// connections to drain before retrying.
fn accept_error_backoff(e: &io::Error) -> Duration {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_secs(1),
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, Infallible> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("request", id = %request_id);

    async move {
        info!("[{}] {} {}", addr, req.method(), req.uri().path());
        Ok::<_, Infallible>(route(&state, addr, req).await)
    }
    .instrument(span)
    .await
}

async fn route(state: &AppState, addr: SocketAddr, req: Request<Incoming>) -> Response<BoxBody> {
    let path = req.uri().path();

    if path == LOGIN_PATH {
        return routes::handle_login(req, state).await;
    }
    if path == LOGOUT_PATH {
        return routes::handle_logout(req, state).await;
    }
    if path == STATIC_PREFIX || path.starts_with("/static/") {
        return routes::handle_static_request(req.method(), path, state.config.static_dir.as_deref())
            .await;
    }

    match state.gate.evaluate(req.headers(), req.uri()) {
        GateDecision::Authenticated => state.forwarder.forward(req, addr).await,
        GateDecision::Unauthenticated { login_location } => {
            debug!("[{}] No valid session, redirecting to login", addr);
            redirect_response(&login_location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_error_backoff() {
        // EMFILE: out of file descriptors
        let exhausted = io::Error::from_raw_os_error(24);
        assert_eq!(accept_error_backoff(&exhausted), Duration::from_secs(1));

        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(accept_error_backoff(&aborted), Duration::ZERO);
    }
}
