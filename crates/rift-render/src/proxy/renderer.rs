//! Renders responses for stubs that proxy to a real upstream.

use super::body;
use super::client::{create_http_client, HttpClient};
use super::headers::{copy_request_headers, copy_response_headers, upstream_host};
use crate::config::{DelaySettings, ProxySettings};
use crate::error::RenderError;
use crate::metrics;
use crate::request::Request;
use crate::response::{DelayPolicy, Response};
use crate::stub::ResponseDefinition;
use http_body_util::BodyExt;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{HeaderMap, Uri};
use std::error::Error as StdError;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ProxyRenderer {
    client: HttpClient,
    settings: ProxySettings,
    delays: DelaySettings,
}

impl ProxyRenderer {
    pub fn new(settings: ProxySettings, delays: DelaySettings) -> Result<Self, anyhow::Error> {
        let client = create_http_client(&settings)?;
        Ok(Self {
            client,
            settings,
            delays,
        })
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Forward `request` to the definition's proxy target and relay the answer.
    pub async fn render(
        &self,
        definition: &ResponseDefinition,
        request: &Request,
    ) -> Result<Response, RenderError> {
        let base_url = definition.proxy_base_url.as_deref().ok_or_else(|| {
            RenderError::InvalidDefinition("response has no proxy base URL".to_string())
        })?;
        let url = upstream_url(base_url, request.url());
        let uri: Uri = url.parse().map_err(|e| {
            RenderError::InvalidDefinition(format!("invalid proxy URL '{url}': {e}"))
        })?;

        debug!("Proxying {} {} to: {}", request.method(), request.url(), url);

        let mut headers = HeaderMap::new();
        copy_request_headers(request.headers(), &mut headers);
        if let Some(host) = upstream_host(&self.settings, request.headers().get(HOST), &uri) {
            headers.insert(HOST, host);
        }
        for (name, value) in &definition.additional_proxy_request_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                RenderError::InvalidDefinition(format!(
                    "invalid proxy request header name '{name}'"
                ))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                RenderError::InvalidDefinition(format!(
                    "invalid value for proxy request header '{name}'"
                ))
            })?;
            headers.insert(name, value);
        }

        let entity = body::encode(request.method(), request.headers(), request.body())
            .map_err(|e| unavailable(&url, "body", format!("could not encode request body: {e}")))?;
        let outbound_body = match entity {
            Some(entity) => {
                if let Some(content_type) = entity.default_content_type {
                    headers.entry(CONTENT_TYPE).or_insert(content_type);
                }
                debug!(
                    "Upstream entity: chunked={}, gzip={}",
                    entity.chunked, entity.gzipped
                );
                entity.body
            }
            None => body::empty(),
        };

        let mut outbound = hyper::Request::new(outbound_body);
        *outbound.method_mut() = request.method().clone();
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        let start = Instant::now();
        let exchange = async {
            let upstream = self
                .client
                .request(outbound)
                .await
                .map_err(|e| ("connect", describe(&e)))?;
            let (parts, body) = upstream.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| ("body", describe(&e)))?
                .to_bytes();
            Ok::<_, (&'static str, String)>((parts, bytes))
        };
        let outcome = tokio::time::timeout(self.settings.read_timeout(), exchange).await;
        let (parts, bytes) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err((reason, message))) => return Err(unavailable(&url, reason, message)),
            Err(_) => {
                return Err(unavailable(
                    &url,
                    "timeout",
                    format!("no response within {}ms", self.settings.read_timeout_ms),
                ))
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_upstream_duration(
            request.method().as_str(),
            parts.status.as_u16(),
            elapsed_ms,
        );
        debug!(
            "Upstream {} answered {} in {:.1}ms ({} bytes)",
            url,
            parts.status,
            elapsed_ms,
            bytes.len()
        );

        let mut response = Response::new(parts.status);
        copy_response_headers(&parts.headers, &mut response.headers);
        response.append_headers(&definition.headers)?;
        response.body = bytes;
        response.from_proxy = true;
        response.delay = DelayPolicy::resolve(&self.delays, definition);
        Ok(response)
    }
}

/// Proxy target joined with the caller's path and query, unchanged.
fn upstream_url(base_url: &str, request_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if request_url.starts_with('/') {
        format!("{base}{request_url}")
    } else {
        format!("{base}/{request_url}")
    }
}

fn unavailable(url: &str, reason: &str, message: String) -> RenderError {
    warn!("Upstream {} unavailable ({}): {}", url, reason, message);
    metrics::record_upstream_failure(reason);
    RenderError::UpstreamUnavailable {
        url: url.to_string(),
        reason: message,
    }
}

/// Error message including its sources.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
