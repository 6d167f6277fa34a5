//! The `response-template` transformer.
//!
//! Produces a copy of a [`ResponseDefinition`] with every templatable field
//! evaluated against the inbound request: body, body file (path, then
//! content), header values, proxy base URL and additional proxy request
//! header values.

use crate::error::RenderError;
use crate::files::FileSource;
use crate::request::Request;
use crate::stub::{ResponseDefinition, RESPONSE_TEMPLATE};
use crate::template::{TemplateContext, TemplateEngine, Value, ValueMap};
use base64::Engine as _;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct ResponseTemplateTransformer {
    engine: Arc<TemplateEngine>,
    global: bool,
    parameters: ValueMap,
}

impl ResponseTemplateTransformer {
    /// `global` templates every definition; otherwise only definitions that
    /// list `response-template` among their transformers.
    pub fn new(engine: Arc<TemplateEngine>, global: bool) -> Self {
        Self {
            engine,
            global,
            parameters: ValueMap::new(),
        }
    }

    /// Parameters visible as `parameters.*` in every template.
    pub fn with_parameters(mut self, parameters: &BTreeMap<String, JsonValue>) -> Self {
        for (name, value) in parameters {
            self.parameters.insert(name.clone(), Value::from(value));
        }
        self
    }

    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    pub fn applies_to(&self, definition: &ResponseDefinition) -> bool {
        self.global || definition.has_transformer(RESPONSE_TEMPLATE)
    }

    pub fn transform(
        &self,
        definition: &ResponseDefinition,
        request: &Request,
        files: &dyn FileSource,
    ) -> Result<ResponseDefinition, RenderError> {
        let context = TemplateContext::from_request(request);
        let mut parameters = self.parameters.clone();
        for (name, value) in &definition.transformer_parameters {
            parameters.insert(name.clone(), Value::from(value));
        }
        let render = |source: &str| -> Result<String, RenderError> {
            if !has_template_markers(source) {
                return Ok(source.to_string());
            }
            self.engine.evaluate(source, &context, &parameters)
        };

        let mut transformed = definition.clone();

        if let Some(body) = &definition.body {
            transformed.body = Some(render(body.as_str())?);
        }

        if let Some(file_name) = &definition.body_file_name {
            let path = render(file_name.as_str())?;
            debug!("Templating body file '{}'", path);
            let contents = files.read(&path).map_err(|source| RenderError::BodyFile {
                path: path.clone(),
                source,
            })?;
            match String::from_utf8(contents) {
                Ok(text) => transformed.body = Some(render(&text)?),
                Err(binary) => {
                    transformed.base64_body =
                        Some(base64::engine::general_purpose::STANDARD.encode(binary.into_bytes()))
                }
            }
            transformed.body_file_name = None;
        }

        for values in transformed.headers.values_mut() {
            let rendered = values
                .iter()
                .map(|value| render(value.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            *values = rendered.into();
        }

        if let Some(base_url) = &definition.proxy_base_url {
            transformed.proxy_base_url = Some(render(base_url.as_str())?);
        }

        for value in transformed.additional_proxy_request_headers.values_mut() {
            *value = render(value.as_str())?;
        }

        Ok(transformed)
    }
}

fn has_template_markers(source: &str) -> bool {
    source.contains("{{")
}
