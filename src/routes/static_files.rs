//! Login page assets under /static/*
//!
//! Served from `--static-dir` when configured. Only plain relative paths
//! inside that directory are reachable.

use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::auth::STATIC_PREFIX;
use crate::routes::{empty_body, full_body, text_response};
use crate::types::BoxBody;

/// Serve a request whose path starts with `/static`
pub async fn handle_static_request(
    method: &Method,
    path: &str,
    static_dir: Option<&Path>,
) -> Response<BoxBody> {
    let is_head = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }
    };

    let Some(root) = static_dir else {
        return not_found();
    };
    let Some(file) = resolve_asset_path(root, path) else {
        debug!("Rejected static path {}", path);
        return not_found();
    };

    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        _ => return not_found(),
    }

    match tokio::fs::read(&file).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            let mut response = if is_head {
                Response::new(empty_body())
            } else {
                Response::new(full_body(contents))
            };
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                headers.insert(CONTENT_TYPE, value);
            }
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
            response
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(),
        Err(e) => {
            warn!("Failed to read static file {}: {}", file.display(), e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Map `/static/<rel>` onto `root/<rel>`, or `None` if it would escape `root`
fn resolve_asset_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.strip_prefix(STATIC_PREFIX)?;
    if !(relative.is_empty() || relative.starts_with('/')) {
        return None;
    }

    let decoded = urlencoding::decode(relative.trim_start_matches('/')).ok()?;
    if decoded.contains('\\') || decoded.contains('\0') {
        return None;
    }

    let relative = Path::new(decoded.as_ref());
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }

    if decoded.is_empty() || decoded.ends_with('/') {
        Some(root.join(relative).join("index.html"))
    } else {
        Some(root.join(relative))
    }
}

fn not_found() -> Response<BoxBody> {
    text_response(StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("portcullis-static-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/app.css"), "body{}").unwrap();
        std::fs::write(dir.join("index.html"), "<p>home</p>").unwrap();
        dir
    }

    #[test]
    fn test_resolve_asset_path() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve_asset_path(root, "/static/css/app.css"),
            Some(root.join("css/app.css"))
        );
        assert_eq!(
            resolve_asset_path(root, "/static/"),
            Some(root.join("index.html"))
        );
        assert_eq!(
            resolve_asset_path(root, "/static/my%20logo.png"),
            Some(root.join("my logo.png"))
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let root = Path::new("/srv/assets");
        for path in [
            "/static/../etc/passwd",
            "/static/css/../../secret",
            "/static/%2e%2e/etc/passwd",
            "/static/%2Fetc%2Fpasswd",
            "/static/..%5C..%5Csecret",
            "/staticfoo/app.css",
        ] {
            assert_eq!(resolve_asset_path(root, path), None, "{path} resolved");
        }
    }

    #[tokio::test]
    async fn test_serves_file_with_mime_type() {
        let dir = temp_dir("serve");
        let response = handle_static_request(&Method::GET, "/static/css/app.css", Some(&dir)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"body{}");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_and_no_dir_are_404() {
        let dir = temp_dir("missing");
        let response = handle_static_request(&Method::GET, "/static/nope.js", Some(&dir)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handle_static_request(&Method::GET, "/static/css/app.css", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_post_not_allowed() {
        let response = handle_static_request(&Method::POST, "/static/app.css", None).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
