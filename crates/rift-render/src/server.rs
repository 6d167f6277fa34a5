//! Minimal HTTP/1 stub server.
//!
//! Matches each inbound request against the [`StubRegistry`], renders the
//! matched definition and writes the result through [`transport`]. Render
//! failures become a `500` with a JSON error body; nothing is partially sent.

use crate::config::Config;
use crate::error::RenderError;
use crate::files::{DirectoryFileSource, FileSource};
use crate::metrics;
use crate::proxy::body::is_gzip_encoded;
use crate::proxy::ProxyRenderer;
use crate::registry::{StubLifecycleListener, StubRegistry};
use crate::renderer::ResponseRenderer;
use crate::request::Request;
use crate::template::TemplateEngine;
use crate::transform::ResponseTemplateTransformer;
use crate::transport::{self, ResponseBody};
use anyhow::Context;
use bytes::Bytes;
use flate2::read::GzDecoder;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Path serving Prometheus metrics.
pub const METRICS_PATH: &str = "/__rift/metrics";

pub struct StubServer {
    registry: Arc<StubRegistry>,
    renderer: Arc<ResponseRenderer>,
}

/// A running server. Dropping it leaves the server running; call
/// [`shutdown`](ServerHandle::shutdown) to stop accepting connections.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("Server task ended abnormally: {}", e);
        }
    }
}

impl StubServer {
    pub fn new(registry: Arc<StubRegistry>, renderer: ResponseRenderer) -> Self {
        Self {
            registry,
            renderer: Arc::new(renderer),
        }
    }

    /// Wire engine, registry, proxy and renderer together from configuration.
    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let engine = Arc::new(
            TemplateEngine::builder()
                .escape_html(config.templating.escape_html)
                .max_cache_entries(config.templating.max_cache_entries)
                .permitted_system_keys(&config.templating.permitted_system_keys)
                .build()
                .context("Failed to build template engine")?,
        );

        let registry = StubRegistry::new()
            .with_listener(Arc::clone(&engine) as Arc<dyn StubLifecycleListener>);
        for stub in &config.stubs {
            registry.add(stub.clone());
        }

        let proxy = ProxyRenderer::new(config.proxy.clone(), config.delays.clone())
            .context("Failed to create proxy client")?;
        let files: Arc<dyn FileSource> = Arc::new(DirectoryFileSource::new(&config.files_root));
        let transformer = ResponseTemplateTransformer::new(engine, config.templating.global)
            .with_parameters(&config.templating.parameters);
        let renderer = ResponseRenderer::new(proxy, config.delays.clone(), files)
            .with_transformer(transformer);

        info!(
            "Loaded {} stubs, global templating {}",
            registry.len(),
            config.templating.global
        );
        Ok(Self::new(Arc::new(registry), renderer))
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }

    /// Bind `addr` and serve in a background task.
    pub async fn bind(self, addr: SocketAddr) -> Result<ServerHandle, anyhow::Error> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        info!("Listening on http://{}", local_addr);

        let server = Arc::new(self);
        let task = tokio::spawn(async move {
            loop {
                let (stream, remote_addr) = tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    },
                    _ = &mut shutdown_rx => {
                        info!("Stub server on {} shutting down", local_addr);
                        break;
                    }
                };

                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let server = Arc::clone(&server);
                        async move { server.handle(req, local_addr).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving HTTP connection from {}: {}", remote_addr, err);
                    }
                });
            }
        });

        Ok(ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    async fn handle(
        &self,
        req: hyper::Request<Incoming>,
        local_addr: SocketAddr,
    ) -> Result<hyper::Response<ResponseBody>, Infallible> {
        if req.uri().path() == METRICS_PATH {
            return Ok(text_response(
                StatusCode::OK,
                "text/plain; version=0.0.4",
                metrics::collect_metrics(),
            ));
        }

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                return Ok(json_error(StatusCode::BAD_REQUEST, "bad_request", &e.to_string()));
            }
        };
        let body = match decode_body(&parts.headers, body) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to decode gzip request body: {}", e);
                return Ok(json_error(StatusCode::BAD_REQUEST, "bad_request", &e.to_string()));
            }
        };

        let (host, port) = match parts.headers.get(HOST).and_then(|h| h.to_str().ok()) {
            Some(value) => split_host_port(value),
            None => (local_addr.ip().to_string(), None),
        };
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let request = Request::builder()
            .method(parts.method.clone())
            .scheme("http")
            .host(host)
            .port(port.unwrap_or(local_addr.port()))
            .url(url)
            .headers(parts.headers.clone())
            .body(body)
            .build();

        let stub = match self.registry.find_match(&request) {
            Some(stub) => stub,
            None => {
                debug!("No stub matched {} {}", request.method(), request.url());
                return Ok(json_error(
                    StatusCode::NOT_FOUND,
                    "no_match",
                    &format!("no stub matched {} {}", request.method(), request.url()),
                ));
            }
        };

        match self.renderer.render(&stub.response, &request).await {
            Ok(response) => Ok(transport::into_http_response(response).await),
            Err(e) => Ok(render_failure(&e)),
        }
    }
}

/// Inbound gzip bodies are handed to rendering decoded.
fn decode_body(headers: &hyper::HeaderMap, body: Bytes) -> std::io::Result<Bytes> {
    if !is_gzip_encoded(headers) || body.is_empty() {
        return Ok(body);
    }
    let mut decoded = Vec::new();
    GzDecoder::new(&body[..]).read_to_end(&mut decoded)?;
    Ok(Bytes::from(decoded))
}

fn split_host_port(value: &str) -> (String, Option<u16>) {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !port.contains(']') => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (value.to_string(), None),
        },
        _ => (value.to_string(), None),
    }
}

fn render_failure(err: &RenderError) -> hyper::Response<ResponseBody> {
    error!("Failed to render response: {}", err);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, err.kind(), &err.to_string())
}

fn json_error(status: StatusCode, kind: &str, message: &str) -> hyper::Response<ResponseBody> {
    let body = serde_json::json!({ "error": kind, "message": message }).to_string();
    text_response(status, "application/json", body)
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> hyper::Response<ResponseBody> {
    let mut response = hyper::Response::new(Full::new(Bytes::from(body)).boxed_unsync());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    response
}
