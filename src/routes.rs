//! Application routing configuration.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!   forward (fallback)
//! ```
//!
//! There are no named routes. Any method on any path is forwarded, so the
//! proxy never shadows a path the upstream might serve. Authorization lives
//! in the pipeline rather than a layer because a rejection must be a bare
//! 403 with nothing else attached.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::{ProxyError, ProxyResult};
    use crate::proxy::{OutboundRequest, Upstream, UpstreamResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Upstream that echoes the outbound path it was asked for.
    struct PathEcho;

    #[async_trait]
    impl Upstream for PathEcho {
        async fn send(&self, request: OutboundRequest) -> ProxyResult<UpstreamResponse> {
            if request.url.host_str() == Some("down.invalid") {
                return Err(ProxyError::Transport("dns failure".into()));
            }
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                status_text: "OK".to_string(),
                headers: HeaderMap::new(),
                body: Body::from(request.url.path().to_string()),
            })
        }
    }

    fn router() -> Router {
        let config = Config {
            secret: "route-secret".to_string(),
            ..Config::default()
        };
        build_router(AppState::new(config, Arc::new(PathEcho)).unwrap())
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_any_path_is_forwarded_to_header_target() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/some/local/path?ignored=1")
                    .header("WannabeToken", "route-secret")
                    .header("WannabeURL", "https://example.com/remote")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "/remote");
    }

    #[tokio::test]
    async fn test_missing_token_forbidden() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("WannabeURL", "https://example.com/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_json() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("WannabeToken", "route-secret")
                    .header("WannabeURL", "https://down.invalid/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "bad_gateway");
        assert!(!body["message"].as_str().unwrap().contains("dns failure"));
    }
}
