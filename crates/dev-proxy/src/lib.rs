//! A reverse proxy for local development.
//!
//! The front end talks to `/api/...` on its own origin; this proxy strips the prefix and forwards
//! the request to the real backend, avoiding cross-origin trouble during development.
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{
            CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
            TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Router,
};
use log::{debug, warn};
use url::Url;

pub const DEFAULT_PREFIX: &str = "/api";
pub const DEFAULT_TARGET: &str = "http://rec-mp-api.tskedu.com/api";

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Only paths under this prefix are forwarded; the prefix itself is dropped.
    pub prefix: String,
    /// Origin, and optionally base path, of the backend.
    pub target: Url,
    /// Accept upstream certificates that do not verify.
    pub accept_invalid_certs: bool,
}

impl ProxyConfig {
    pub fn new(target: Url) -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            target,
            accept_invalid_certs: true,
        }
    }
}

/// Map a request's path and query onto the upstream.
///
/// Returns `None` for paths outside `prefix`. The prefix must end at a segment boundary, so
/// `/apis` is not under `/api`.
pub fn rewrite(prefix: &str, target: &Url, path_and_query: &str) -> Option<Url> {
    let rest = path_and_query.strip_prefix(prefix)?;
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')) {
        return None;
    }
    Url::parse(&format!("{}{rest}", target.as_str().trim_end_matches('/'))).ok()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[derive(Clone)]
struct Proxy {
    config: Arc<ProxyConfig>,
    client: reqwest::Client,
}

impl Proxy {
    async fn forward(&self, request: Request) -> anyhow::Result<Response> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let Some(url) = rewrite(&self.config.prefix, &self.config.target, path_and_query) else {
            debug!("Not forwarding {path_and_query}");
            return Ok(StatusCode::NOT_FOUND.into_response());
        };
        debug!("{} {path_and_query} -> {url}", parts.method);

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .context("Failed to read request body")?;
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        // The client fills in the upstream's host.
        headers.remove(HOST);

        let upstream = self
            .client
            .request(parts.method, url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to forward to {url}"))?;
        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = upstream
            .bytes()
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

async fn forward(State(proxy): State<Proxy>, request: Request) -> Response {
    match proxy.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("{e:?}");
            (StatusCode::BAD_GATEWAY, format!("{e:#}")).into_response()
        }
    }
}

pub fn router(config: ProxyConfig) -> anyhow::Result<Router> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to create reqwest client.")?;
    let proxy = Proxy {
        config: Arc::new(config),
        client,
    };
    Ok(Router::new().fallback(forward).with_state(proxy))
}
