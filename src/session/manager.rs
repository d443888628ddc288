//! Session issue, revocation and lookup over the `auth-session` cookie
//!
//! The server keeps no session table. Every decision is rebuilt from the
//! sealed cookie the browser sends back.

use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::session::codec::{unix_now, Session, SessionCodec, SESSION_COOKIE_NAME};
use crate::types::{GatewayError, Result};

/// 9999-12-31T23:59:59Z, the last instant an HTTP date can express
const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// Issues and checks client-held sessions
pub struct SessionManager {
    codec: SessionCodec,
    cookie_secure: bool,
}

impl SessionManager {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_codec(
            SessionCodec::new(config.session_secret.as_bytes(), config.session_max_age),
            config.cookie_secure,
        )
    }

    pub fn with_codec(codec: SessionCodec, cookie_secure: bool) -> Self {
        Self {
            codec,
            cookie_secure,
        }
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Start an authenticated session by attaching a sealed cookie to the response
    pub fn issue(&self, response_headers: &mut HeaderMap, username: &str) -> Result<()> {
        let now = unix_now();
        let max_age = self.codec.max_age();
        let token = self
            .codec
            .encode(&Session::authenticated(username, now, max_age))?;

        let max_age_secs = max_age.as_secs().min(MAX_HTTP_DATE_SECS);
        let expires = now.saturating_add(max_age_secs).min(MAX_HTTP_DATE_SECS);

        let cookie = self.cookie(&token, max_age_secs, expires);
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| GatewayError::Session(format!("Invalid cookie header: {e}")))?;
        response_headers.append(SET_COOKIE, value);

        info!("Session issued for {}", username);
        Ok(())
    }

    /// End the session. Always writes an expired cookie, whether or not the
    /// request carried a valid session, so logout is idempotent.
    pub fn revoke(&self, response_headers: &mut HeaderMap, request_headers: &HeaderMap) -> Result<()> {
        let username = self
            .current_session(request_headers)
            .map(|s| s.username)
            .unwrap_or_default();

        // Overwrite with a logged-out record in case a client ignores Max-Age
        let token = match self.codec.encode(&Session::revoked(&username, unix_now())) {
            Ok(token) => token,
            Err(e) => {
                debug!("Could not seal revoked session, clearing value instead: {}", e);
                String::new()
            }
        };

        let cookie = self.cookie(&token, 0, 0);
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| GatewayError::Session(format!("Invalid cookie header: {e}")))?;
        response_headers.append(SET_COOKIE, value);

        if username.is_empty() {
            debug!("Logout without an active session");
        } else {
            info!("Session revoked for {}", username);
        }
        Ok(())
    }

    /// The first valid authenticated session carried by the request, if any
    pub fn current_session(&self, request_headers: &HeaderMap) -> Option<Session> {
        session_cookie_values(request_headers)
            .into_iter()
            .find_map(|token| match self.codec.decode(token) {
                Ok(session) if session.authenticated => Some(session),
                Ok(_) => None,
                Err(reason) => {
                    debug!("Ignoring session cookie: {}", reason);
                    None
                }
            })
    }

    pub fn is_authenticated(&self, request_headers: &HeaderMap) -> bool {
        self.current_session(request_headers).is_some()
    }

    fn cookie(&self, value: &str, max_age_secs: u64, expires_unix: u64) -> String {
        let secure_flag = if self.cookie_secure { "; Secure" } else { "" };
        format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; Max-Age={max_age_secs}; Expires={}; HttpOnly; SameSite=Lax{secure_flag}",
            http_date(expires_unix)
        )
    }
}

/// IMF-fixdate for a cookie `Expires` attribute
fn http_date(unix_secs: u64) -> String {
    let secs = i64::try_from(unix_secs.min(MAX_HTTP_DATE_SECS)).unwrap_or(0);
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// All `auth-session` values across every Cookie header
pub fn session_cookie_values(headers: &HeaderMap) -> Vec<&str> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager(secure: bool) -> SessionManager {
        SessionManager::with_codec(
            SessionCodec::new(b"manager-secret", Duration::from_secs(3600)),
            secure,
        )
    }

    /// Turn a Set-Cookie header into the Cookie header a browser would send
    fn request_with_cookie(set_cookie: &HeaderValue) -> HeaderMap {
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    #[test]
    fn test_issue_sets_cookie_attributes() {
        let manager = manager(false);
        let mut response = HeaderMap::new();
        manager.issue(&mut response, "admin").unwrap();

        let cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("auth-session="));
        assert!(cookie.contains("; Path=/"));
        assert!(cookie.contains("; Max-Age=3600"));
        assert!(cookie.contains("; HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_secure_flag_is_configurable() {
        let manager = manager(true);
        let mut response = HeaderMap::new();
        manager.issue(&mut response, "admin").unwrap();

        let cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_issued_cookie_authenticates() {
        let manager = manager(false);
        let mut response = HeaderMap::new();
        manager.issue(&mut response, "admin").unwrap();

        let request = request_with_cookie(response.get(SET_COOKIE).unwrap());
        assert!(manager.is_authenticated(&request));
        assert_eq!(manager.current_session(&request).unwrap().username, "admin");
    }

    #[test]
    fn test_missing_or_foreign_cookie_is_unauthenticated() {
        let manager = manager(false);
        assert!(!manager.is_authenticated(&HeaderMap::new()));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; auth-session=garbage"));
        assert!(!manager.is_authenticated(&headers));
    }

    #[test]
    fn test_cookie_from_other_secret_is_rejected() {
        let mut response = HeaderMap::new();
        manager(false).issue(&mut response, "admin").unwrap();

        let other = SessionManager::with_codec(
            SessionCodec::new(b"rotated-secret", Duration::from_secs(3600)),
            false,
        );
        let request = request_with_cookie(response.get(SET_COOKIE).unwrap());
        assert!(!other.is_authenticated(&request));
    }

    #[test]
    fn test_revoke_expires_cookie() {
        let manager = manager(false);
        let mut issued = HeaderMap::new();
        manager.issue(&mut issued, "admin").unwrap();
        let request = request_with_cookie(issued.get(SET_COOKIE).unwrap());

        let mut response = HeaderMap::new();
        manager.revoke(&mut response, &request).unwrap();

        let set_cookie = response.get(SET_COOKIE).unwrap();
        let cookie = set_cookie.to_str().unwrap();
        assert!(cookie.contains("; Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));

        // Even a client that keeps the value is not authenticated by it
        assert!(!manager.is_authenticated(&request_with_cookie(set_cookie)));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let manager = manager(false);

        let mut first = HeaderMap::new();
        manager.revoke(&mut first, &HeaderMap::new()).unwrap();
        let after_first = request_with_cookie(first.get(SET_COOKIE).unwrap());

        let mut second = HeaderMap::new();
        manager.revoke(&mut second, &after_first).unwrap();
        let after_second = request_with_cookie(second.get(SET_COOKIE).unwrap());

        assert!(!manager.is_authenticated(&after_first));
        assert!(!manager.is_authenticated(&after_second));
        assert!(second
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("; Max-Age=0"));
    }

    #[test]
    fn test_any_valid_cookie_among_many() {
        let manager = manager(false);
        let mut response = HeaderMap::new();
        manager.issue(&mut response, "admin").unwrap();
        let pair = response
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("auth-session=stale"));
        headers.append(COOKIE, HeaderValue::from_str(&format!("lang=en; {pair}")).unwrap());
        assert!(manager.is_authenticated(&headers));
    }

    #[test]
    fn test_session_cookie_values_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("a=1; auth-session=abc;auth-session=; other-auth-session=x"),
        );
        assert_eq!(session_cookie_values(&headers), vec!["abc"]);
    }
}
