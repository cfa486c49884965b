use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Proxy-wide error types with appropriate HTTP status codes.
///
/// A rejected token is not an error: the pipeline answers it with a plain
/// 403 before any of these can occur.
///
/// # Request Errors
///
/// - `MalformedTarget` - the `WannabeURL` header is missing or unusable (400)
/// - `Transport` - the upstream could not be reached or answered garbage (502)
/// - `UpstreamTimeout` - no response head within the configured deadline (504)
///
/// # Startup Errors
///
/// `Config` and `InvalidAddress` are raised while loading configuration and
/// should never surface from a live request.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Malformed target: {0}")]
    MalformedTarget(String),

    #[error("Upstream transport failed: {0}")]
    Transport(String),

    #[error("Upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Error response body for synthetic proxy responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ProxyError {
    /// HTTP status code returned to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MalformedTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Config(_) | ProxyError::InvalidAddress(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        tracing::error!(error = %self, "Request failed");

        let status = self.status_code();
        let (error_type, message) = match &self {
            // Client errors - the message describes the caller's own header
            ProxyError::MalformedTarget(msg) => ("malformed_target", msg.clone()),

            // Upstream errors - never leak resolver or socket details
            ProxyError::Transport(_) => (
                "bad_gateway",
                "The target could not be reached.".to_string(),
            ),
            ProxyError::UpstreamTimeout(_) => (
                "gateway_timeout",
                "The target did not respond in time.".to_string(),
            ),

            ProxyError::Config(_) | ProxyError::InvalidAddress(_) => (
                "internal_error",
                "Proxy configuration error. Please contact the operator.".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with ProxyError.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::MalformedTarget("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::Transport("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::UpstreamTimeout(Duration::from_secs(1)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::Config("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_transport_error_hides_details() {
        let response =
            ProxyError::Transport("dns error: no record for internal.corp".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "bad_gateway");
        assert!(!body["message"].as_str().unwrap().contains("internal.corp"));
    }

    #[tokio::test]
    async fn test_malformed_target_message_is_exposed() {
        let response =
            ProxyError::MalformedTarget("missing WannabeURL header".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "malformed_target");
        assert_eq!(body["message"], "missing WannabeURL header");
    }
}
