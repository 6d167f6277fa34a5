//! Which headers cross the proxy hop.
//!
//! `content-length`, `transfer-encoding` and `connection` never cross in
//! either direction; the client recomputes them from the outgoing entity.
//! CORS response headers from the target are dropped, and the request Host
//! header is rewritten unless it is explicitly preserved.

use crate::config::ProxySettings;
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::{HeaderMap, Uri};

const FORBIDDEN: [&str; 3] = ["content-length", "transfer-encoding", "connection"];
const CORS_PREFIX: &str = "access-control-";

fn is_forbidden(name: &str) -> bool {
    FORBIDDEN.iter().any(|f| name.eq_ignore_ascii_case(f))
}

/// Whether a caller header is copied onto the upstream request as-is.
/// `host` is handled separately by [`upstream_host`].
pub fn should_forward_request_header(name: &str) -> bool {
    !is_forbidden(name) && !name.eq_ignore_ascii_case(HOST.as_str())
}

/// Whether an upstream response header is relayed to the caller.
pub fn should_forward_response_header(name: &str) -> bool {
    !is_forbidden(name)
        && !name
            .get(..CORS_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CORS_PREFIX))
}

/// Host header for the upstream request: the caller's when preserved, else
/// the configured override, else the target authority.
pub fn upstream_host(
    settings: &ProxySettings,
    original: Option<&HeaderValue>,
    target: &Uri,
) -> Option<HeaderValue> {
    if settings.preserve_host_header {
        if let Some(host) = original {
            return Some(host.clone());
        }
    }
    if let Some(host) = &settings.host_header {
        if let Ok(value) = HeaderValue::from_str(host) {
            return Some(value);
        }
    }
    target
        .authority()
        .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
}

/// Copy forwardable caller headers, keeping multi-value order per name.
pub fn copy_request_headers(original: &HeaderMap, out: &mut HeaderMap) {
    copy_filtered(original, out, should_forward_request_header);
}

/// Copy relayable upstream headers, keeping multi-value order per name.
pub fn copy_response_headers(upstream: &HeaderMap, out: &mut HeaderMap) {
    copy_filtered(upstream, out, should_forward_response_header);
}

fn copy_filtered(from: &HeaderMap, out: &mut HeaderMap, keep: fn(&str) -> bool) {
    for name in from.keys() {
        if !keep(name.as_str()) {
            continue;
        }
        for value in from.get_all(name) {
            out.append(HeaderName::clone(name), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_in_both_directions() {
        for name in ["Content-Length", "transfer-encoding", "CONNECTION"] {
            assert!(!should_forward_request_header(name));
            assert!(!should_forward_response_header(name));
        }
        assert!(should_forward_request_header("x-custom"));
        assert!(should_forward_response_header("x-custom"));
    }

    #[test]
    fn test_cors_dropped_from_responses_only() {
        assert!(!should_forward_response_header("Access-Control-Allow-Origin"));
        assert!(!should_forward_response_header("access-control-max-age"));
        assert!(should_forward_request_header("access-control-request-method"));
        assert!(should_forward_response_header("access"));
    }

    #[test]
    fn test_host_rules() {
        let target: Uri = "http://upstream.local:9000/base".parse().unwrap();
        let original = HeaderValue::from_static("caller.example");

        let settings = ProxySettings::default();
        assert!(!should_forward_request_header("Host"));
        assert_eq!(
            upstream_host(&settings, Some(&original), &target).unwrap(),
            "upstream.local:9000"
        );

        let preserving = ProxySettings {
            preserve_host_header: true,
            ..ProxySettings::default()
        };
        assert_eq!(
            upstream_host(&preserving, Some(&original), &target).unwrap(),
            "caller.example"
        );

        let overriding = ProxySettings {
            host_header: Some("override.example".to_string()),
            ..ProxySettings::default()
        };
        assert_eq!(
            upstream_host(&overriding, Some(&original), &target).unwrap(),
            "override.example"
        );
    }

    #[test]
    fn test_copy_keeps_multi_value_order() {
        let mut original = HeaderMap::new();
        original.append("x-multi", HeaderValue::from_static("one"));
        original.append("x-multi", HeaderValue::from_static("two"));
        original.insert("host", HeaderValue::from_static("caller"));
        original.insert("content-length", HeaderValue::from_static("3"));

        let mut out = HeaderMap::new();
        copy_request_headers(&original, &mut out);
        let values: Vec<_> = out.get_all("x-multi").iter().collect();
        assert_eq!(values, vec!["one", "two"]);
        assert!(out.get("host").is_none());
        assert!(out.get("content-length").is_none());
    }
}
