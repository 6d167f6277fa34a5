//! HTTP client creation and configuration.
//!
//! One pooled client is shared by every proxied render.

use super::forward::ForwardProxyConnector;
use super::tls::trust_all_client_config;
use crate::config::ProxySettings;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the HTTP client used by the proxy renderer.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<ForwardProxyConnector>, BoxBody<Bytes, hyper::Error>>;

/// Create the shared HTTP client with connection pooling.
pub fn create_http_client(settings: &ProxySettings) -> Result<HttpClient, anyhow::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(settings.connect_timeout()));
    http_connector.set_nodelay(true);
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let via = settings.forward_proxy()?;
    if let Some(via) = &via {
        info!("Proxy targets are reached through forward proxy {}", via);
    }
    let connector = ForwardProxyConnector::new(http_connector, via);

    let https_connector = if settings.trust_all_certificates {
        warn!("TLS certificate verification DISABLED for proxy targets");
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(trust_all_client_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector)
    } else {
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector)
    };

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .build(https_connector);

    info!(
        "Proxy connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, connect_timeout={}ms, read_timeout={}ms",
        settings.max_idle_per_host,
        settings.idle_timeout_secs,
        settings.connect_timeout_ms,
        settings.read_timeout_ms
    );

    Ok(http_client)
}
