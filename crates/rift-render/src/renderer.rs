//! The render boundary: one matched stub plus one request in, a
//! [`Response`] or a [`RenderError`] out.
//!
//! Templating runs first when it applies, since a proxy target URL may itself
//! be a template. The (possibly templated) definition is then either proxied
//! or rendered statically.

use crate::config::DelaySettings;
use crate::error::RenderError;
use crate::files::FileSource;
use crate::metrics;
use crate::proxy::ProxyRenderer;
use crate::request::Request;
use crate::response::{DelayPolicy, Response};
use crate::stub::ResponseDefinition;
use crate::transform::ResponseTemplateTransformer;
use base64::Engine as _;
use bytes::Bytes;
use hyper::StatusCode;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

pub struct ResponseRenderer {
    proxy: ProxyRenderer,
    transformer: Option<ResponseTemplateTransformer>,
    files: Arc<dyn FileSource>,
    delays: DelaySettings,
}

impl ResponseRenderer {
    pub fn new(proxy: ProxyRenderer, delays: DelaySettings, files: Arc<dyn FileSource>) -> Self {
        Self {
            proxy,
            transformer: None,
            files,
            delays,
        }
    }

    pub fn with_transformer(mut self, transformer: ResponseTemplateTransformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub async fn render(
        &self,
        definition: &ResponseDefinition,
        request: &Request,
    ) -> Result<Response, RenderError> {
        let result = self.render_inner(definition, request).await;
        match &result {
            Ok(response) if response.from_proxy => metrics::record_render("proxy"),
            Ok(_) if self.templates(definition) => metrics::record_render("templated"),
            Ok(_) => metrics::record_render("static"),
            Err(e) => {
                debug!("Render failed ({}): {}", e.kind(), e);
                metrics::record_render("error")
            }
        }
        result
    }

    async fn render_inner(
        &self,
        definition: &ResponseDefinition,
        request: &Request,
    ) -> Result<Response, RenderError> {
        let definition = match &self.transformer {
            Some(transformer) if transformer.applies_to(definition) => {
                Cow::Owned(transformer.transform(definition, request, self.files.as_ref())?)
            }
            _ => Cow::Borrowed(definition),
        };

        if definition.is_proxy() {
            self.proxy.render(&definition, request).await
        } else {
            self.render_static(&definition)
        }
    }

    fn templates(&self, definition: &ResponseDefinition) -> bool {
        self.transformer
            .as_ref()
            .is_some_and(|transformer| transformer.applies_to(definition))
    }

    fn render_static(&self, definition: &ResponseDefinition) -> Result<Response, RenderError> {
        let status = StatusCode::from_u16(definition.status).map_err(|_| {
            RenderError::InvalidDefinition(format!("invalid status code {}", definition.status))
        })?;

        let mut response = Response::new(status);
        response.append_headers(&definition.headers)?;
        response.body = self.static_body(definition)?;
        response.delay = DelayPolicy::resolve(&self.delays, definition);
        Ok(response)
    }

    fn static_body(&self, definition: &ResponseDefinition) -> Result<Bytes, RenderError> {
        if let Some(body) = &definition.body {
            return Ok(Bytes::from(body.clone()));
        }
        if let Some(encoded) = &definition.base64_body {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(|e| RenderError::InvalidDefinition(format!("invalid base64 body: {e}")));
        }
        if let Some(path) = &definition.body_file_name {
            return self
                .files
                .read(path)
                .map(Bytes::from)
                .map_err(|source| RenderError::BodyFile {
                    path: path.clone(),
                    source,
                });
        }
        Ok(Bytes::new())
    }
}
