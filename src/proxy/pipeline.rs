//! Request forwarding pipeline.
//!
//! # Flow
//!
//! ```text
//! InboundRequest
//!    │
//!    ▼
//! ┌──────────────────┐
//! │    authorize     │ ← 403, empty body, nothing forwarded
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  filter headers  │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  resolve target  │ ← 400 if WannabeURL is missing or unusable
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ resolve client IP│ ← WannabeIP, else synthesized from the pool
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  upstream call   │ ← 502 transport failure, 504 deadline
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ normalize status │ ← outside 200..=599 becomes 200
//! └────────┬─────────┘
//!          ▼
//!      Response
//! ```
//!
//! Each request is independent; the pipeline holds only read-only
//! configuration and the shared upstream client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::ext::ReasonPhrase;
use tracing::{debug, warn};
use url::Url;

use super::address::AddressPool;
use super::auth::authorize;
use super::headers::{IP_HEADER, URL_HEADER, apply_forwarding, combined_value, filter_headers};
use super::upstream::{OutboundRequest, Upstream, UpstreamResponse};
use crate::error::{ProxyError, ProxyResult};

/// Lowest upstream status passed through unchanged.
pub const MIN_PASSTHROUGH_STATUS: u16 = 200;

/// Highest upstream status passed through unchanged.
pub const MAX_PASSTHROUGH_STATUS: u16 = 599;

/// Request as received from the caller.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Body,
}

impl From<Request> for InboundRequest {
    fn from(request: Request) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            headers: parts.headers,
            body,
        }
    }
}

/// Resolved forwarding target.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
    /// Hostname of the URL, without port, ready for the `Host` header.
    pub host: HeaderValue,
}

/// Authorizes, rewrites and forwards one request per call.
#[derive(Clone)]
pub struct ForwardingPipeline {
    secret: Arc<String>,
    pool: AddressPool,
    upstream: Arc<dyn Upstream>,
    timeout: Option<Duration>,
}

impl fmt::Debug for ForwardingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingPipeline")
            .field("secret", &"<redacted>")
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ForwardingPipeline {
    /// Create a pipeline with no upstream deadline.
    pub fn new(secret: impl Into<String>, pool: AddressPool, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            pool,
            upstream,
            timeout: None,
        }
    }

    /// Bound the wait for the upstream response head. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Handle one inbound request; always yields exactly one response.
    pub async fn handle(&self, request: InboundRequest) -> Response {
        if !authorize(&request.headers, &self.secret) {
            warn!(method = %request.method, "Rejected request with missing or invalid token");
            return forbidden_response();
        }

        match self.forward(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn forward(&self, request: InboundRequest) -> ProxyResult<Response> {
        let InboundRequest {
            method,
            headers: inbound,
            body,
        } = request;

        let mut headers = filter_headers(&inbound);
        let target = resolve_target(&inbound)?;
        let (client_ip, synthesized) = self.resolve_client_ip(&inbound)?;

        debug!(
            method = %method,
            host = %target.url.host_str().unwrap_or_default(),
            synthesized,
            "Forwarding request"
        );

        apply_forwarding(&mut headers, target.host, client_ip);

        let outbound = OutboundRequest {
            method,
            url: target.url,
            headers,
            body,
        };

        let call = self.upstream.send(outbound);
        let upstream = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProxyError::UpstreamTimeout(limit))??,
            None => call.await?,
        };

        Ok(into_proxy_response(upstream))
    }

    /// Pick the client address: the caller's override, or a synthesized one.
    ///
    /// An empty override counts as absent.
    fn resolve_client_ip(&self, headers: &HeaderMap) -> ProxyResult<(HeaderValue, bool)> {
        if let Some(ip) = combined_value(headers, IP_HEADER)
            && !ip.is_empty()
        {
            return Ok((ip, false));
        }

        let ip = self.pool.synthesize();
        let value = HeaderValue::from_str(&ip)
            .map_err(|e| ProxyError::InvalidAddress(format!("'{ip}': {e}")))?;
        Ok((value, true))
    }
}

/// Parse the `WannabeURL` header into a forwarding target.
///
/// # Errors
///
/// Returns `ProxyError::MalformedTarget` when the header is missing, is not
/// an absolute `http`/`https` URL, or has no host.
pub fn resolve_target(headers: &HeaderMap) -> ProxyResult<Target> {
    let raw = combined_value(headers, URL_HEADER)
        .ok_or_else(|| ProxyError::MalformedTarget(format!("Missing {URL_HEADER} header")))?;

    let raw = raw.to_str().map_err(|_| {
        ProxyError::MalformedTarget(format!("{URL_HEADER} header is not valid text"))
    })?;

    let url = Url::parse(raw.trim()).map_err(|e| {
        ProxyError::MalformedTarget(format!("{URL_HEADER} is not an absolute URL: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::MalformedTarget(format!(
            "{URL_HEADER} scheme '{}' is not http or https",
            url.scheme()
        )));
    }

    let hostname = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProxyError::MalformedTarget(format!("{URL_HEADER} has no host")))?;

    let host = HeaderValue::from_str(hostname).map_err(|_| {
        ProxyError::MalformedTarget(format!("{URL_HEADER} host is not a valid header value"))
    })?;

    Ok(Target { url, host })
}

/// Map an upstream status into the range callers accept.
///
/// Statuses in `200..=599` pass through; anything else becomes 200.
pub fn normalize_status(status: StatusCode) -> StatusCode {
    if (MIN_PASSTHROUGH_STATUS..=MAX_PASSTHROUGH_STATUS).contains(&status.as_u16()) {
        status
    } else {
        StatusCode::OK
    }
}

/// Terminal response for a missing or wrong token.
fn forbidden_response() -> Response {
    StatusCode::FORBIDDEN.into_response()
}

/// Relay an upstream response: normalized status, everything else as received.
fn into_proxy_response(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status: upstream_status,
        status_text,
        headers,
        body,
    } = upstream;

    let status = normalize_status(upstream_status);
    if status != upstream_status {
        debug!(
            upstream_status = upstream_status.as_u16(),
            status = status.as_u16(),
            "Substituted upstream status"
        );
    }

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    // The status text follows the upstream, even when the code was substituted.
    if status.canonical_reason() != Some(status_text.as_str())
        && let Ok(reason) = ReasonPhrase::try_from(status_text.as_bytes())
    {
        response.extensions_mut().insert(reason);
    }

    response
}
