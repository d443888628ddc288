//! Login page rendering
//!
//! The page is a single embedded HTML document. Placeholders are filled in
//! one pass so substituted values are never re-scanned for placeholders.

use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::routes::full_body;
use crate::types::BoxBody;

const TEMPLATE: &str = include_str!("../../ui/login.html");

/// Renders the sign-in form
#[derive(Debug, Clone)]
pub struct LoginPage {
    title: String,
}

impl LoginPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// HTML for the form, with an optional error banner and the post-login target
    pub fn render(&self, error: Option<&str>, redirect: &str) -> String {
        let error_block = error
            .map(|message| format!(r#"<div class="error" role="alert">{}</div>"#, escape_html(message)))
            .unwrap_or_default();

        let mut html = String::with_capacity(TEMPLATE.len() + 256);
        let mut rest = TEMPLATE;
        while let Some(start) = rest.find("{{") {
            html.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                html.push_str(&rest[start..]);
                rest = "";
                break;
            };

            match &after[..end] {
                "title" => html.push_str(&escape_html(&self.title)),
                "redirect" => html.push_str(&escape_html(redirect)),
                "error_block" => html.push_str(&error_block),
                other => {
                    html.push_str("{{");
                    html.push_str(other);
                    html.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        html.push_str(rest);
        html
    }

    pub fn response(&self, status: StatusCode, error: Option<&str>, redirect: &str) -> Response<BoxBody> {
        let mut response = Response::new(full_body(self.render(error, redirect)));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Escape text for use in HTML content and double-quoted attributes
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
