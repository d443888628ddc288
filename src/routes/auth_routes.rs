//! HTTP routes for authentication
//!
//! - GET  /auth/login  - Render the sign-in form
//! - POST /auth/login  - Check credentials, issue a session, redirect back
//! - GET|POST /auth/logout - Revoke the session, redirect to the form

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::auth::{sanitize_redirect, CredentialValidator, LOGIN_PATH};
use crate::routes::{method_not_allowed, query_param, redirect_response, text_response};
use crate::server::AppState;
use crate::types::{BoxBody, BoxError};

/// Largest accepted login form body
pub const MAX_FORM_BYTES: usize = 16 * 1024;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Fields posted by the login form
#[derive(Deserialize, Default)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("redirect", &self.redirect)
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum FormError {
    TooLarge,
    Invalid,
}

/// Handle /auth/login
pub async fn handle_login<B>(req: Request<B>, state: &AppState) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match *req.method() {
        Method::GET | Method::HEAD => {
            let redirect = sanitize_redirect(query_param(req.uri(), "redirect").as_deref());
            state.login_page.response(StatusCode::OK, None, &redirect)
        }
        Method::POST => submit_login(req, state).await,
        _ => method_not_allowed("GET, HEAD, POST"),
    }
}

async fn submit_login<B>(req: Request<B>, state: &AppState) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let query_redirect = query_param(req.uri(), "redirect");

    let form = match read_form(req.into_body()).await {
        Ok(form) => form,
        Err(FormError::TooLarge) => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Login form too large");
        }
        Err(FormError::Invalid) => {
            return text_response(StatusCode::BAD_REQUEST, "Invalid login form");
        }
    };

    let redirect = sanitize_redirect(query_redirect.as_deref().or(form.redirect.as_deref()));
    let username = form.username.clone();

    if !check_credentials(&state.credentials, form).await {
        warn!("Failed login for user {:?}", username);
        return state.login_page.response(
            StatusCode::UNAUTHORIZED,
            Some(INVALID_CREDENTIALS),
            &redirect,
        );
    }

    let mut response = redirect_response(&redirect);
    if let Err(e) = state.sessions.issue(response.headers_mut(), &username) {
        error!("Failed to issue session for {}: {}", username, e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    info!("Login succeeded for {}, redirecting to {}", username, redirect);
    response
}

/// Hash verification is CPU-bound, so it runs off the async workers
async fn check_credentials(validator: &CredentialValidator, form: LoginForm) -> bool {
    let validator = validator.clone();
    let LoginForm {
        username, password, ..
    } = form;
    let password = Zeroizing::new(password);

    match tokio::task::spawn_blocking(move || validator.validate(&username, &password)).await {
        Ok(valid) => valid,
        Err(e) => {
            error!("Credential check task failed: {}", e);
            false
        }
    }
}

async fn read_form<B>(body: B) -> Result<LoginForm, FormError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes: Bytes = match Limited::new(body, MAX_FORM_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Err(FormError::TooLarge);
        }
        Err(_) => return Err(FormError::Invalid),
    };

    serde_urlencoded::from_bytes(&bytes).map_err(|_| FormError::Invalid)
}

/// Handle /auth/logout
pub async fn handle_logout<B>(req: Request<B>, state: &AppState) -> Response<BoxBody> {
    match *req.method() {
        Method::GET | Method::POST => {
            let mut response = redirect_response(LOGIN_PATH);
            if let Err(e) = state.sessions.revoke(response.headers_mut(), req.headers()) {
                // Logout still succeeds from the browser's point of view
                error!("Failed to write logout cookie: {}", e);
            }
            response
        }
        _ => method_not_allowed("GET, POST"),
    }
}
