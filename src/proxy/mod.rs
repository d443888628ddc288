//! Reverse proxy to the protected application
//!
//! Provides:
//! - Streaming request/response forwarding via reqwest
//! - Hop-by-hop header stripping and `X-Forwarded-*` headers
//! - Upstream URL joining against the target base path
//! - Protocol upgrades (WebSocket and friends) spliced end to end

pub mod forwarder;
pub mod headers;

pub use forwarder::Forwarder;
pub use headers::{
    rewrite_request_headers, set_upgrade_headers, strip_hop_by_hop, upgrade_protocol, upstream_url,
    HOP_BY_HOP_HEADERS,
};
