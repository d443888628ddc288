//! Header and URL rewriting for forwarded requests

use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, HOST, UPGRADE};
use hyper::Uri;
use std::net::SocketAddr;

/// Headers that describe a single connection and must not be relayed
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Remove hop-by-hop headers, including any named in `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// The `Upgrade` value of a message that asks for (or confirms) a protocol
/// switch: `Connection` must list the `upgrade` token.
pub fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let listed = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    if listed {
        headers.get(UPGRADE).cloned()
    } else {
        None
    }
}

/// Put back the switch headers that hop-by-hop stripping removed
pub fn set_upgrade_headers(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(UPGRADE, protocol);
}

/// Prepare inbound request headers for the upstream.
///
/// `Host` is dropped so the client sets the upstream authority; the
/// original host and the client address travel in `X-Forwarded-*`.
pub fn rewrite_request_headers(headers: &mut HeaderMap, client_addr: SocketAddr) {
    strip_hop_by_hop(headers);
    let original_host = headers.remove(HOST);

    let client_ip = client_addr.ip().to_string();
    let forwarded_for = match headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
    {
        Some(prior) => format!("{prior}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    if let Some(host) = original_host {
        if !headers.contains_key(X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }

    // A TLS terminator in front of us may already have set this
    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
}

/// Build the upstream URL: target base path joined to the request path by a
/// single slash, target and request queries concatenated with `&`.
pub fn upstream_url(target: &Uri, request: &Uri) -> String {
    let scheme = target.scheme_str().unwrap_or("http");
    let authority = target.authority().map(|a| a.as_str()).unwrap_or_default();
    let path = join_paths(target.path(), request.path());

    let query = match (
        target.query().filter(|q| !q.is_empty()),
        request.query().filter(|q| !q.is_empty()),
    ) {
        (Some(base), Some(extra)) => format!("?{base}&{extra}"),
        (Some(q), None) | (None, Some(q)) => format!("?{q}"),
        (None, None) => String::new(),
    };

    format!("{scheme}://{authority}{path}{query}")
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
