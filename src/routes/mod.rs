//! HTTP routes served by the gateway itself

pub mod auth_routes;
pub mod login_page;
pub mod static_files;

pub use auth_routes::{handle_login, handle_logout, LoginForm, MAX_FORM_BYTES};
pub use login_page::{escape_html, LoginPage};
pub use static_files::handle_static_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode, Uri};

use crate::types::BoxBody;

pub fn full_body(chunk: impl Into<Bytes>) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty_body() -> BoxBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// 302 to `location`; falls back to `/` if it is not a valid header value
pub fn redirect_response(location: &str) -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(
        LOCATION,
        HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/")),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Plain-text response with a fixed message
pub fn text_response(status: StatusCode, message: &'static str) -> Response<BoxBody> {
    let mut response = Response::new(full_body(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn method_not_allowed(allow: &'static str) -> Response<BoxBody> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

/// First value of query parameter `name`, percent-decoded
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_response() {
        let response = redirect_response("/auth/login?redirect=%2Fx");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/auth/login?redirect=%2Fx");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");

        let response = redirect_response("/bad\nvalue");
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[test]
    fn test_method_not_allowed() {
        let response = method_not_allowed("GET, POST");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST");
    }

    #[test]
    fn test_query_param() {
        let uri: Uri = "/auth/login?a=1&redirect=%2Freports%3Fy%3D2".parse().unwrap();
        assert_eq!(query_param(&uri, "redirect").as_deref(), Some("/reports?y=2"));
        assert_eq!(query_param(&uri, "a").as_deref(), Some("1"));
        assert_eq!(query_param(&uri, "missing"), None);

        let uri: Uri = "/auth/login".parse().unwrap();
        assert_eq!(query_param(&uri, "redirect"), None);
    }
}
