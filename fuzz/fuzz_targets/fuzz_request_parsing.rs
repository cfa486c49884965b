//! Fuzz testing for caller-controlled request parsing.
//!
//! Everything a caller can put in a request before authorization succeeds,
//! or in the `WannabeURL`/`WannabeIP` headers after it, flows through these
//! functions. None of them may panic.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the target
//! cargo +nightly fuzz run fuzz_request_parsing
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_request_parsing -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `ip2lon` / `AddressPool::new`: dotted-quad parsing and mask bounds
//! - `resolve_target`: arbitrary `WannabeURL` header bytes
//! - `filter_headers` / `authorize`: arbitrary header names and values

#![no_main]

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use libfuzzer_sys::fuzz_target;
use wannabe_proxy::proxy::{AddressPool, authorize, filter_headers, ip2lon, is_stripped, lon2ip, resolve_target};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Any accepted address must survive a round trip
        if let Ok(lon) = ip2lon(s) {
            assert_eq!(ip2lon(&lon2ip(lon)).ok(), Some(lon));
        }

        let mask = data.first().copied().unwrap_or(0);
        if let Ok(pool) = AddressPool::new(s, mask) {
            let _ = pool.synthesize();
        }
    }

    let Ok(value) = HeaderValue::from_bytes(data) else {
        return;
    };

    let mut headers = HeaderMap::new();
    headers.insert("wannabeurl", value.clone());
    headers.insert("wannabetoken", value.clone());
    let _ = resolve_target(&headers);
    let _ = authorize(&headers, "fuzz-secret");

    // Split the input into a header name and value at the first colon
    if let Some(split) = data.iter().position(|&b| b == b':')
        && let Ok(name) = HeaderName::from_bytes(&data[..split])
        && let Ok(value) = HeaderValue::from_bytes(&data[split + 1..])
    {
        headers.append(name, value);
    }

    let filtered = filter_headers(&headers);
    assert!(filtered.keys().all(|name| !is_stripped(name.as_str())));
});
