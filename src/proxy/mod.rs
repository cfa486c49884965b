//! Forwarding core.
//!
//! - [`auth`] checks the shared secret
//! - [`headers`] builds the outbound header set
//! - [`address`] converts and synthesizes IPv4 client addresses
//! - [`upstream`] performs the outbound hop
//! - [`pipeline`] ties them together per request

pub mod address;
pub mod auth;
pub mod headers;
pub mod pipeline;
pub mod upstream;

pub use address::{AddressPool, ip2lon, lon2ip};
pub use auth::authorize;
pub use headers::{IP_HEADER, TOKEN_HEADER, URL_HEADER, filter_headers, is_stripped};
pub use pipeline::{ForwardingPipeline, InboundRequest, normalize_status, resolve_target};
pub use upstream::{HttpUpstream, OutboundRequest, Upstream, UpstreamResponse};
