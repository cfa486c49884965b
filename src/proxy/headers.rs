//! Outbound header filtering.
//!
//! # Removed Headers
//!
//! Filtering is allow-by-default. A header is dropped when its (lowercase)
//! name is one of:
//!
//! - `wannabetoken` - the shared secret
//! - `wannabeurl` - the target URL directive
//! - `wannabeip` - the client address override
//! - anything starting with `cf-` - edge-injected metadata
//! - `x-forwarded-for`, `x-real-ip` - caller-forged client identity
//!
//! Everything else is copied unchanged. After filtering, [`apply_forwarding`]
//! overwrites `Host`, `X-Real-Ip` and `X-Forwarded-For`.
//!
//! # Multiple Values
//!
//! The outbound set holds at most one value per name. Repeated inbound
//! headers are joined with `", "` in arrival order, the way a fetch-style
//! header set presents them.

use std::borrow::Cow;

use axum::http::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

/// Header carrying the shared secret.
pub const TOKEN_HEADER: &str = "WannabeToken";

/// Header carrying the absolute target URL.
pub const URL_HEADER: &str = "WannabeURL";

/// Header carrying the optional client address override.
pub const IP_HEADER: &str = "WannabeIP";

/// Prefix of edge-injected metadata headers.
pub const VENDOR_PREFIX: &str = "cf-";

/// Client identity header set on every outbound request.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Client identity header set on every outbound request.
pub const X_REAL_IP: &str = "x-real-ip";

/// Check whether a header name must never reach the upstream.
///
/// Header names from the `http` crate are already lowercase; the comparison
/// is still case-insensitive so callers may pass raw names.
pub fn is_stripped(name: &str) -> bool {
    let name: Cow<'_, str> = if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    };

    name.eq_ignore_ascii_case(TOKEN_HEADER)
        || name.eq_ignore_ascii_case(URL_HEADER)
        || name.eq_ignore_ascii_case(IP_HEADER)
        || name.starts_with(VENDOR_PREFIX)
        || name == X_FORWARDED_FOR
        || name == X_REAL_IP
}

/// Read a header as a single value, joining repeats with `", "`.
///
/// Returns `None` when the header is absent.
pub fn combined_value(headers: &HeaderMap, name: &str) -> Option<HeaderValue> {
    let mut values = headers.get_all(name).iter();
    let first = values.next()?;

    let mut combined: Option<Vec<u8>> = None;
    for value in values {
        let buf = combined.get_or_insert_with(|| first.as_bytes().to_vec());
        buf.extend_from_slice(b", ");
        buf.extend_from_slice(value.as_bytes());
    }

    match combined {
        // Joining valid values with ", " always yields a valid value.
        Some(bytes) => HeaderValue::from_bytes(&bytes).ok(),
        None => Some(first.clone()),
    }
}

/// Build the outbound header set from the inbound one.
pub fn filter_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.keys_len());

    for name in inbound.keys() {
        if is_stripped(name.as_str()) {
            trace!(header = %name, "Stripping control header");
            continue;
        }
        if let Some(value) = combined_value(inbound, name.as_str()) {
            outbound.insert(name.clone(), value);
        }
    }

    outbound
}

/// Set the headers that identify the target host and presented client.
///
/// These overwrite any value already present for the same names.
pub fn apply_forwarding(headers: &mut HeaderMap, host: HeaderValue, client_ip: HeaderValue) {
    headers.insert(HOST, host);
    headers.insert(HeaderName::from_static(X_REAL_IP), client_ip.clone());
    headers.insert(HeaderName::from_static(X_FORWARDED_FOR), client_ip);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_is_stripped_control_headers() {
        assert!(is_stripped("wannabetoken"));
        assert!(is_stripped("WannabeToken"));
        assert!(is_stripped("WANNABEURL"));
        assert!(is_stripped("wannabeip"));
    }

    #[test]
    fn test_is_stripped_vendor_and_identity_headers() {
        assert!(is_stripped("cf-connecting-ip"));
        assert!(is_stripped("CF-Ray"));
        assert!(is_stripped("cf-"));
        assert!(is_stripped("X-Forwarded-For"));
        assert!(is_stripped("x-real-ip"));
    }

    #[test]
    fn test_is_stripped_keeps_lookalikes() {
        assert!(!is_stripped("accept"));
        assert!(!is_stripped("x-forwarded-proto"));
        assert!(!is_stripped("cfg-version"));
        assert!(!is_stripped("wannabe"));
        assert!(!is_stripped("x-cf-thing"));
    }

    #[test]
    fn test_filter_headers_removes_denied_and_keeps_rest() {
        let inbound = headers(&[
            ("wannabetoken", "secret"),
            ("wannabeurl", "https://example.com/"),
            ("wannabeip", "10.1.2.3"),
            ("cf-ray", "abc123"),
            ("cf-connecting-ip", "198.51.100.7"),
            ("x-forwarded-for", "203.0.113.9"),
            ("x-real-ip", "203.0.113.9"),
            ("accept", "text/html"),
            ("user-agent", "curl/8.0"),
        ]);

        let outbound = filter_headers(&inbound);

        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound.get("accept").unwrap(), "text/html");
        assert_eq!(outbound.get("user-agent").unwrap(), "curl/8.0");
        for (name, _) in &outbound {
            assert!(!is_stripped(name.as_str()), "{name} leaked");
        }
    }

    #[test]
    fn test_filter_headers_joins_repeated_values() {
        let inbound = headers(&[("accept", "text/html"), ("accept", "application/json")]);

        let outbound = filter_headers(&inbound);

        assert_eq!(outbound.get_all("accept").iter().count(), 1);
        assert_eq!(
            outbound.get("accept").unwrap(),
            "text/html, application/json"
        );
    }

    #[test]
    fn test_filter_headers_keeps_values_verbatim() {
        let inbound = headers(&[("x-custom", "  MiXeD Case ; q=1 ")]);
        let outbound = filter_headers(&inbound);
        assert_eq!(outbound.get("x-custom").unwrap(), "  MiXeD Case ; q=1 ");
    }

    #[test]
    fn test_filter_headers_empty() {
        assert!(filter_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_combined_value() {
        let map = headers(&[("a", "1"), ("a", "2"), ("a", "3"), ("b", "x")]);
        assert_eq!(combined_value(&map, "a").unwrap(), "1, 2, 3");
        assert_eq!(combined_value(&map, "B").unwrap(), "x");
        assert!(combined_value(&map, "c").is_none());
    }

    #[test]
    fn test_apply_forwarding_overwrites() {
        let mut map = headers(&[
            ("host", "proxy.local"),
            ("x-real-ip", "1.1.1.1"),
            ("accept", "*/*"),
        ]);

        apply_forwarding(
            &mut map,
            HeaderValue::from_static("example.com"),
            HeaderValue::from_static("10.1.2.3"),
        );

        assert_eq!(map.get(HOST).unwrap(), "example.com");
        assert_eq!(map.get("X-Real-Ip").unwrap(), "10.1.2.3");
        assert_eq!(map.get("X-Forwarded-For").unwrap(), "10.1.2.3");
        assert_eq!(map.get_all(HOST).iter().count(), 1);
        assert_eq!(map.get("accept").unwrap(), "*/*");
    }
}
