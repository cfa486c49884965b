//! Outbound HTTP call.
//!
//! The pipeline talks to the upstream through the [`Upstream`] trait so the
//! forwarding logic can be exercised without a network. [`HttpUpstream`] is
//! the production implementation on top of `reqwest`.
//!
//! # Streaming
//!
//! Neither direction buffers a whole body:
//!
//! ```text
//! caller body ──▶ bounded channel ──▶ reqwest request body
//! upstream body ──▶ bytes_stream ──▶ axum response body
//! ```
//!
//! The inbound body is pumped through a bounded channel because `reqwest`
//! requires a `Sync` stream; the channel bound keeps backpressure intact.
//! Dropping the returned response (e.g. the caller hung up) drops the
//! upstream connection with it.
//!
//! # Redirects
//!
//! Redirects are followed here, fetch-style, up to 20 hops. Each hop
//! rewrites `Host` to the new hostname. 303 (and 301/302 after a POST)
//! switches to a bodyless GET. Credentials are dropped when the origin
//! changes. A redirect that would need a streamed body resent is relayed
//! to the caller instead.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_LOCATION,
    CONTENT_TYPE, COOKIE, HOST, LOCATION, PROXY_AUTHORIZATION, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use futures_util::StreamExt;
use hyper::ext::ReasonPhrase;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};
use url::Url;

use crate::error::{ProxyError, ProxyResult};

/// Number of in-flight request body chunks between caller and upstream.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Redirect hops followed before the redirect itself is relayed.
const MAX_REDIRECTS: usize = 20;

/// Request handed to the upstream.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Response received from the upstream, body still streaming.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Reason phrase reported for the upstream status.
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Something that can perform the single outbound hop.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send the request and wait for the response head.
    async fn send(&self, request: OutboundRequest) -> ProxyResult<UpstreamResponse>;
}

/// `reqwest`-backed upstream.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Build the outbound client.
    ///
    /// System proxy variables are ignored: this process is the proxy.
    /// Redirects are followed by [`HttpUpstream`] itself so that `Host`
    /// tracks every hop.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the TLS backend cannot be initialised.
    pub fn new(connect_timeout: Duration) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| ProxyError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client. It should not follow redirects on its own.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: OutboundRequest) -> ProxyResult<UpstreamResponse> {
        let OutboundRequest {
            mut method,
            mut url,
            mut headers,
            body,
        } = request;

        let mut body = (!is_empty_body(&body)).then_some(body);
        let mut body_sent = false;
        let mut hops = 0;

        let response = loop {
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = body.take() {
                builder = builder.body(stream_body(body));
                body_sent = true;
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ProxyError::Transport(e.to_string()))?;

            let Some(next) = redirect_target(response.status(), response.headers(), &url) else {
                break response;
            };
            if hops >= MAX_REDIRECTS {
                debug!(hops, "Redirect limit reached, relaying redirect");
                break response;
            }

            let next_method = redirected_method(response.status(), &method);
            if next_method == method && body_sent {
                // A streamed body cannot be replayed
                debug!(status = %response.status(), "Cannot resend body, relaying redirect");
                break response;
            }
            if next_method != method {
                strip_body_headers(&mut headers);
                body_sent = false;
            }
            if !same_origin(&url, &next) {
                strip_credentials(&mut headers);
            }
            if let Some(host) = next.host_str()
                && let Ok(host) = HeaderValue::from_str(host)
            {
                headers.insert(HOST, host);
            }

            hops += 1;
            trace!(hop = hops, location = %next, method = %next_method, "Following redirect");
            method = next_method;
            url = next;
        };

        let status = response.status();
        let status_text = reason_phrase(&response);
        let headers = response.headers().clone();
        debug!(status = %status, redirects = hops, "Upstream responded");

        Ok(UpstreamResponse {
            status,
            status_text,
            headers,
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}

/// Reason phrase as sent by the upstream, or the canonical one.
///
/// hyper only records the phrase when it differs from the canonical text.
fn reason_phrase(response: &reqwest::Response) -> String {
    match response.extensions().get::<ReasonPhrase>() {
        Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Where a redirect response points, if it is one we follow.
fn redirect_target(status: StatusCode, headers: &HeaderMap, current: &Url) -> Option<Url> {
    if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// Method for the next hop: 303 becomes GET, and so do 301/302 after a POST.
fn redirected_method(status: StatusCode, method: &Method) -> Method {
    match status.as_u16() {
        303 if *method != Method::HEAD => Method::GET,
        301 | 302 if *method == Method::POST => Method::GET,
        _ => method.clone(),
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Drop headers describing a request body that is no longer sent.
fn strip_body_headers(headers: &mut HeaderMap) {
    for name in [
        CONTENT_LENGTH,
        CONTENT_TYPE,
        CONTENT_ENCODING,
        CONTENT_LANGUAGE,
        CONTENT_LOCATION,
        TRANSFER_ENCODING,
    ] {
        headers.remove(name);
    }
}

/// Drop credentials before contacting another origin.
fn strip_credentials(headers: &mut HeaderMap) {
    for name in [AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE] {
        headers.remove(name);
    }
}

/// Whether a body is known to carry no bytes.
fn is_empty_body(body: &Body) -> bool {
    body.is_end_stream() || body.size_hint().exact() == Some(0)
}

/// Convert an inbound body into a streaming `reqwest` body.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            if tx.send(chunk).await.is_err() {
                trace!("Upstream stopped reading the request body");
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}
