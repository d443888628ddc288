//! Authentication gate in front of the forwarder
//!
//! Every gated request is decided on its own from the session cookie it
//! carries: either it passes through untouched or it is sent to the login
//! page with its original path + query preserved in `redirect`.

use hyper::header::HeaderMap;
use hyper::Uri;
use std::sync::Arc;

use crate::session::SessionManager;

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const STATIC_PREFIX: &str = "/static";

/// Outcome of checking one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward the request unchanged
    Authenticated,
    /// Redirect to the login page
    Unauthenticated { login_location: String },
}

/// Two-state guard consulted before forwarding
#[derive(Clone)]
pub struct AuthGate {
    sessions: Arc<SessionManager>,
}

impl AuthGate {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn evaluate(&self, headers: &HeaderMap, uri: &Uri) -> GateDecision {
        if self.sessions.is_authenticated(headers) {
            GateDecision::Authenticated
        } else {
            GateDecision::Unauthenticated {
                login_location: login_redirect_location(uri),
            }
        }
    }
}

/// `/auth/login?redirect=<percent-encoded path and query>`
pub fn login_redirect_location(uri: &Uri) -> String {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(original))
}

/// Reduce a user-supplied post-login target to a same-origin path.
///
/// Absolute URLs, protocol-relative `//host` forms, backslashes (which
/// browsers treat as `/`), control characters and non-ASCII all fall back
/// to `/`.
pub fn sanitize_redirect(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(target) if is_local_path(target) => target.to_string(),
        _ => "/".to_string(),
    }
}

fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && target.is_ascii()
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_ascii_control())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{unix_now, Session, SessionCodec};
    use hyper::header::{HeaderValue, COOKIE, SET_COOKIE};
    use std::time::Duration;

    const SECRET: &[u8] = b"gate-secret";

    fn gate() -> AuthGate {
        AuthGate::new(Arc::new(SessionManager::with_codec(
            SessionCodec::new(SECRET, Duration::from_secs(3600)),
            false,
        )))
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("auth-session={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_login_location_encodes_path_and_query() {
        let uri: Uri = "/reports/2024".parse().unwrap();
        assert_eq!(
            login_redirect_location(&uri),
            "/auth/login?redirect=%2Freports%2F2024"
        );

        let uri: Uri = "/search?q=a b&x=1".replace(' ', "%20").parse().unwrap();
        assert_eq!(
            login_redirect_location(&uri),
            "/auth/login?redirect=%2Fsearch%3Fq%3Da%2520b%26x%3D1"
        );
    }

    #[test]
    fn test_no_cookie_redirects() {
        let uri: Uri = "/reports/2024".parse().unwrap();
        assert_eq!(
            gate().evaluate(&HeaderMap::new(), &uri),
            GateDecision::Unauthenticated {
                login_location: "/auth/login?redirect=%2Freports%2F2024".to_string()
            }
        );
    }

    #[test]
    fn test_valid_cookie_passes() {
        let gate = gate();
        let mut issued = HeaderMap::new();
        gate.sessions.issue(&mut issued, "admin").unwrap();
        let pair = issued
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(gate.evaluate(&headers, &uri), GateDecision::Authenticated);
    }

    #[test]
    fn test_expired_cookie_redirects() {
        let codec = SessionCodec::new(SECRET, Duration::from_secs(3600));
        let token = codec
            .encode(&Session::authenticated(
                "admin",
                unix_now() - 7200,
                Duration::from_secs(3600),
            ))
            .unwrap();

        let uri: Uri = "/x".parse().unwrap();
        assert!(matches!(
            gate().evaluate(&cookie_headers(&token), &uri),
            GateDecision::Unauthenticated { .. }
        ));
    }

    #[test]
    fn test_tampered_cookie_redirects() {
        let codec = SessionCodec::new(SECRET, Duration::from_secs(3600));
        let token = codec
            .encode(&Session::authenticated("admin", unix_now(), Duration::from_secs(3600)))
            .unwrap();
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'x' { b'y' } else { b'x' };
        let tampered = String::from_utf8(bytes).unwrap();

        let uri: Uri = "/x".parse().unwrap();
        assert!(matches!(
            gate().evaluate(&cookie_headers(&tampered), &uri),
            GateDecision::Unauthenticated { .. }
        ));
    }

    #[test]
    fn test_unauthenticated_flag_redirects() {
        let codec = SessionCodec::new(SECRET, Duration::from_secs(3600));
        let mut session = Session::authenticated("admin", unix_now(), Duration::from_secs(3600));
        session.authenticated = false;
        let token = codec.encode(&session).unwrap();

        let uri: Uri = "/x".parse().unwrap();
        assert!(matches!(
            gate().evaluate(&cookie_headers(&token), &uri),
            GateDecision::Unauthenticated { .. }
        ));
    }

    #[test]
    fn test_sanitize_redirect_keeps_local_paths() {
        assert_eq!(sanitize_redirect(Some("/dashboard")), "/dashboard");
        assert_eq!(sanitize_redirect(Some("/a/b?c=d&e=f")), "/a/b?c=d&e=f");
        assert_eq!(sanitize_redirect(Some("/")), "/");
    }

    #[test]
    fn test_sanitize_redirect_rejects_external_targets() {
        for target in [
            "https://evil.example/phish",
            "http://evil.example",
            "//evil.example/phish",
            "/\\evil.example",
            "\\\\evil.example",
            "/\t/evil.example",
            "javascript:alert(1)",
            "dashboard",
            "/caf\u{e9}",
            "",
        ] {
            assert_eq!(sanitize_redirect(Some(target)), "/", "{target:?} accepted");
        }
        assert_eq!(sanitize_redirect(None), "/");
    }
}
