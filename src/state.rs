//! Shared application state for Axum handlers.
//!
//! The state is immutable after startup: configuration plus the forwarding
//! pipeline, both behind `Arc` so cloning per request is cheap.

use std::sync::Arc;

use crate::config::Config;
use crate::error::ProxyResult;
use crate::proxy::{ForwardingPipeline, Upstream};

/// Shared application state for Axum handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Request forwarding pipeline
    pub pipeline: Arc<ForwardingPipeline>,
}

impl AppState {
    /// Create application state from configuration and an upstream client.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the synthesized address range is invalid.
    pub fn new(config: Config, upstream: Arc<dyn Upstream>) -> ProxyResult<Self> {
        let pipeline = ForwardingPipeline::new(config.secret.clone(), config.address_pool()?, upstream)
            .with_timeout(config.upstream_timeout());

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::proxy::HttpUpstream;
    use std::time::Duration;

    #[tokio::test]
    async fn test_state_from_default_config() {
        let upstream = Arc::new(HttpUpstream::new(Duration::from_secs(1)).unwrap());
        let state = AppState::new(Config::default(), upstream).unwrap();
        assert_eq!(state.config.port, 8787);
    }

    #[tokio::test]
    async fn test_state_rejects_bad_pool() {
        let upstream = Arc::new(HttpUpstream::new(Duration::from_secs(1)).unwrap());
        let config = Config {
            synth_base_address: "not-an-ip".to_string(),
            ..Config::default()
        };
        assert!(AppState::new(config, upstream).is_err());
    }
}
