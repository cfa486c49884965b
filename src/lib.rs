//! # Wannabe Proxy
//!
//! A single-hop HTTP forwarding proxy. Callers name the real target in a
//! header, prove they hold a shared secret, and optionally choose the client
//! address the target should see:
//!
//! - **Access control**: `WannabeToken` must equal the configured secret
//! - **Targeting**: `WannabeURL` carries the absolute target URL
//! - **Client identity**: `WannabeIP`, or a random address from a fixed range
//! - **Transparency**: method, body, headers and status are relayed as-is
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Trace)                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fallback handler (forward)                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ForwardingPipeline (auth → headers → address → upstream)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  HttpUpstream (reqwest, streaming bodies)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wannabe_proxy::{AppState, Config, HttpUpstream, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _ = dotenvy::dotenv();
//!     let config = Config::from_env()?;
//!     let upstream = HttpUpstream::new(config.upstream_connect_timeout)?;
//!
//!     let state = AppState::new(config, Arc::new(upstream))?;
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Usage
//!
//! ```bash
//! WANNABE_SECRET=s3cret cargo run
//! curl -H 'WannabeToken: s3cret' -H 'WannabeURL: https://example.com/' localhost:8787
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, LogFormat};
pub use error::{ProxyError, ProxyResult};
pub use proxy::{AddressPool, ForwardingPipeline, HttpUpstream, Upstream};
pub use routes::build_router;
pub use state::AppState;
