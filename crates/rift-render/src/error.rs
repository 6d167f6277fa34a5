//! Error types surfaced by response rendering.
//!
//! Every failure reaching the render boundary is a [`RenderError`]. Template
//! compilation failures ([`TemplateError`]) and helper failures
//! ([`HelperError`]) convert into it with `?`.

use thiserror::Error;

/// Failure while producing a response for a matched stub.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The proxy target could not be reached, or did not answer in time.
    #[error("upstream {url} unavailable: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    /// A template (body, header value, proxy URL, ...) failed to compile.
    #[error(transparent)]
    TemplateSyntax(#[from] TemplateError),

    /// A helper rejected its arguments or failed at render time.
    #[error(transparent)]
    HelperEvaluation(#[from] HelperError),

    /// The template cache was configured with a negative capacity.
    #[error("invalid template cache size {0}: max cache entries must not be negative")]
    CacheConfiguration(i64),

    /// The response definition references a body file that cannot be read.
    #[error("body file '{path}' could not be read: {source}")]
    BodyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The response definition itself is unusable (bad base64 body, bad header).
    #[error("invalid response definition: {0}")]
    InvalidDefinition(String),
}

impl RenderError {
    /// Short machine-readable kind, used as a metrics label and in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::UpstreamUnavailable { .. } => "upstream_unavailable",
            RenderError::TemplateSyntax(_) => "template_syntax",
            RenderError::HelperEvaluation(_) => "helper_evaluation",
            RenderError::CacheConfiguration(_) => "cache_configuration",
            RenderError::BodyFile { .. } => "body_file",
            RenderError::InvalidDefinition(_) => "invalid_definition",
        }
    }
}

/// Template source that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template syntax error at line {line}, column {column}: {message}")]
pub struct TemplateError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl TemplateError {
    /// Build an error positioned at byte `offset` of `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let prefix = &source.as_bytes()[..offset];
        let line = prefix.iter().filter(|b| **b == b'\n').count() + 1;
        let column = match prefix.iter().rposition(|b| *b == b'\n') {
            Some(newline) => offset - newline,
            None => offset + 1,
        };
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Failure raised by a template helper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("helper '{helper}' failed: {message}")]
pub struct HelperError {
    pub helper: String,
    pub message: String,
}

impl HelperError {
    pub fn new(helper: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
            message: message.into(),
        }
    }
}
