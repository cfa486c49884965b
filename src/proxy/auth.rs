//! Shared-secret authorization.
//!
//! Every inbound request must present the configured secret in the
//! `WannabeToken` header. The header name is matched case-insensitively,
//! the value byte-for-byte.
//!
//! Comparison is constant-time (`subtle`) so response latency does not
//! reveal how much of a guessed token was correct.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use super::headers::{TOKEN_HEADER, combined_value};

/// Check whether the inbound headers carry the configured secret.
///
/// A missing header never matches, not even an empty secret.
pub fn authorize(headers: &HeaderMap, secret: &str) -> bool {
    match combined_value(headers, TOKEN_HEADER) {
        Some(token) => constant_time_eq(token.as_bytes(), secret.as_bytes()),
        None => false,
    }
}

/// Perform constant-time comparison of two byte strings.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // This returns 1 if equal, 0 if not
    a.ct_eq(b).into()
}
