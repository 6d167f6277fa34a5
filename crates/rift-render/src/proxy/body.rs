//! Outbound request entity for proxied calls.
//!
//! Only PUT, POST and PATCH carry a body upstream. A caller that sent
//! `Transfer-Encoding: chunked` gets a streamed entity of unknown length so
//! the client re-chunks it; anything else goes out with a fixed length. A
//! `Content-Encoding: gzip` body is compressed again, since the server hands
//! rendering the decoded bytes.

use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE, TRANSFER_ENCODING};
use hyper::{HeaderMap, Method};
use std::convert::Infallible;
use std::io::{self, Write};

pub type OutboundBody = BoxBody<Bytes, hyper::Error>;

const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A body ready to attach to the upstream request.
pub struct OutboundEntity {
    pub body: OutboundBody,
    /// Content-Type to send when the caller declared none.
    pub default_content_type: Option<HeaderValue>,
    pub chunked: bool,
    pub gzipped: bool,
}

pub fn method_carries_body(method: &Method) -> bool {
    matches!(*method, Method::PUT | Method::POST | Method::PATCH)
}

/// Whether the first `Content-Encoding` value mentions gzip. The server
/// decodes such bodies on the way in and [`encode`] compresses them again,
/// so both sides must agree on this test.
pub fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("gzip"))
}

fn header_contains(
    headers: &HeaderMap,
    name: impl hyper::header::AsHeaderName,
    token: &str,
) -> bool {
    headers.get_all(name).iter().any(|value| {
        value
            .to_str()
            .map(|v| {
                v.split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    })
}

/// Build the upstream entity for `body`, or `None` when the method sends none.
pub fn encode(
    method: &Method,
    headers: &HeaderMap,
    body: &Bytes,
) -> io::Result<Option<OutboundEntity>> {
    if !method_carries_body(method) {
        return Ok(None);
    }

    let gzipped = is_gzip_encoded(headers);
    let payload = if gzipped {
        Bytes::from(gzip(body)?)
    } else {
        body.clone()
    };

    let chunked = header_contains(headers, TRANSFER_ENCODING, "chunked");
    let body = if chunked {
        streamed(payload)
    } else {
        fixed(payload)
    };

    let default_content_type = if headers.contains_key(CONTENT_TYPE) {
        None
    } else {
        Some(HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
    };

    Ok(Some(OutboundEntity {
        body,
        default_content_type,
        chunked,
        gzipped,
    }))
}

pub fn empty() -> OutboundBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}

fn fixed(payload: Bytes) -> OutboundBody {
    Full::new(payload)
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// No size hint, so the client frames it with chunked transfer encoding.
fn streamed(payload: Bytes) -> OutboundBody {
    let frames = futures::stream::iter([Ok::<_, Infallible>(Frame::data(payload))]);
    StreamBody::new(frames)
        .map_err(|never: Infallible| match never {})
        .boxed()
}

fn gzip(plain: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use hyper::body::Body;
    use std::io::Read;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_only_body_methods() {
        let body = Bytes::from_static(b"x");
        assert!(encode(&Method::GET, &HeaderMap::new(), &body).unwrap().is_none());
        assert!(encode(&Method::DELETE, &HeaderMap::new(), &body).unwrap().is_none());
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            assert!(encode(&method, &HeaderMap::new(), &body).unwrap().is_some());
        }
    }

    #[test]
    fn test_fixed_length_by_default() {
        let entity = encode(&Method::POST, &HeaderMap::new(), &Bytes::from_static(b"hello"))
            .unwrap()
            .unwrap();
        assert!(!entity.chunked);
        assert_eq!(entity.body.size_hint().exact(), Some(5));
        assert_eq!(
            entity.default_content_type.unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_chunked_has_unknown_length() {
        let entity = encode(
            &Method::POST,
            &headers(&[("transfer-encoding", "chunked"), ("content-type", "application/json")]),
            &Bytes::from_static(b"{}"),
        )
        .unwrap()
        .unwrap();
        assert!(entity.chunked);
        assert_eq!(entity.body.size_hint().exact(), None);
        assert!(entity.default_content_type.is_none());
    }

    #[tokio::test]
    async fn test_gzip_reencoded() {
        let entity = encode(
            &Method::PUT,
            &headers(&[("content-encoding", "gzip")]),
            &Bytes::from_static(b"plain text body"),
        )
        .unwrap()
        .unwrap();
        assert!(entity.gzipped);

        let compressed = entity.body.collect().await.unwrap().to_bytes();
        let mut decoded = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "plain text body");
    }

    #[test]
    fn test_gzip_detection_matches_substring() {
        assert!(is_gzip_encoded(&headers(&[("content-encoding", "gzip")])));
        assert!(is_gzip_encoded(&headers(&[("content-encoding", "x-gzip")])));
        assert!(is_gzip_encoded(&headers(&[("content-encoding", "GZIP")])));
        assert!(!is_gzip_encoded(&headers(&[("content-encoding", "deflate")])));
        assert!(!is_gzip_encoded(&HeaderMap::new()));
        // Only the first value counts
        assert!(!is_gzip_encoded(&headers(&[
            ("content-encoding", "br"),
            ("content-encoding", "gzip"),
        ])));

        let entity = encode(
            &Method::POST,
            &headers(&[("content-encoding", "x-gzip")]),
            &Bytes::from_static(b"x"),
        )
        .unwrap()
        .unwrap();
        assert!(entity.gzipped);
    }
}
