//! Upstream forwarder
//!
//! Relays an authenticated request to the target application and streams
//! the response back. Neither body is buffered; redirects and compressed
//! bodies from the upstream pass through to the browser untouched.
//!
//! A request that asks for a protocol switch keeps its `Upgrade` headers.
//! When the upstream answers 101, both connections are taken over and
//! bytes are copied between them until either side closes.

use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Body, Frame, Incoming};
use hyper::header::{HeaderValue, UPGRADE};
use hyper::upgrade::OnUpgrade;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::proxy::headers::{
    rewrite_request_headers, set_upgrade_headers, strip_hop_by_hop, upgrade_protocol, upstream_url,
};
use crate::routes::{empty_body, full_body};
use crate::types::{BoxBody, BoxError, GatewayError, Result};

/// Idle upstream connections are dropped after this long
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Reverse proxy to the single configured target
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    target: Uri,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.upstream_connect_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build upstream client: {e}")))?;

        Ok(Self {
            client,
            target: config.target.clone(),
        })
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    /// Forward `req`; any upstream failure becomes a 502
    pub async fn forward(&self, req: Request<Incoming>, client_addr: SocketAddr) -> Response<BoxBody> {
        match self.try_forward(req, client_addr).await {
            Ok(response) => response,
            Err(e) => {
                warn!("[{}] {}", client_addr, e);
                bad_gateway()
            }
        }
    }

    async fn try_forward(&self, mut req: Request<Incoming>, client_addr: SocketAddr) -> Result<Response<BoxBody>> {
        let protocol = upgrade_protocol(req.headers());
        let client_upgrade = protocol.as_ref().map(|_| hyper::upgrade::on(&mut req));

        let (mut parts, body) = req.into_parts();
        let url = upstream_url(&self.target, &parts.uri);
        rewrite_request_headers(&mut parts.headers, client_addr);
        if let Some(protocol) = protocol {
            set_upgrade_headers(&mut parts.headers, protocol);
        }

        debug!("Forwarding {} {} -> {}", parts.method, parts.uri, url);

        let mut builder = self
            .client
            .request(parts.method, url.as_str())
            .headers(parts.headers);
        if !body.is_end_stream() {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = builder
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Request to {url} failed: {e}")))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        if status == StatusCode::SWITCHING_PROTOCOLS {
            let Some(client_upgrade) = client_upgrade else {
                return Err(GatewayError::Upstream(format!(
                    "{url} switched protocols without being asked"
                )));
            };
            if let Some(protocol) = upstream.headers().get(UPGRADE).cloned() {
                set_upgrade_headers(&mut headers, protocol);
            }
            tokio::spawn(splice(client_upgrade, upstream, client_addr));

            let mut response = Response::new(empty_body());
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            return Ok(response);
        }

        let stream = upstream
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(|e| -> BoxError { Box::new(e) });

        let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Copy bytes both ways between the upgraded client and upstream connections
async fn splice(client: OnUpgrade, upstream: reqwest::Response, client_addr: SocketAddr) {
    let client = match client.await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            warn!("[{}] Client upgrade failed: {}", client_addr, e);
            return;
        }
    };
    let mut upstream = match upstream.upgrade().await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            warn!("[{}] Upstream upgrade failed: {}", client_addr, e);
            return;
        }
    };

    let mut client = TokioIo::new(client);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((sent, received)) => {
            info!(
                "[{}] Upgraded connection closed ({} bytes up, {} bytes down)",
                client_addr, sent, received
            );
        }
        Err(e) => debug!("[{}] Upgraded connection ended: {}", client_addr, e),
    }
}

fn bad_gateway() -> Response<BoxBody> {
    let mut response = Response::new(full_body("Bad Gateway"));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
