//! Concrete responses handed to the transport layer.

use crate::config::DelaySettings;
use crate::error::RenderError;
use crate::stub::{ChunkedDribbleDelay, HeaderValues, ResponseDefinition};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

/// How the transport should pace a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelayPolicy {
    /// Wait before the first byte is sent.
    pub initial_delay: Duration,
    /// Spread the body over several chunks once the initial delay elapsed.
    pub chunked_dribble: Option<ChunkedDribbleDelay>,
}

impl DelayPolicy {
    /// Combine per-definition delays with server-wide ones.
    ///
    /// The fixed part is the definition's fixed delay, else the global one.
    /// The random part is sampled from the definition's distribution, else the
    /// global one. The dribble delay only comes from the definition.
    pub fn resolve(global: &DelaySettings, definition: &ResponseDefinition) -> Self {
        let fixed = definition
            .fixed_delay_milliseconds
            .or(global.fixed_delay_ms)
            .unwrap_or(0);
        let random = definition
            .delay_distribution
            .as_ref()
            .or(global.delay_distribution.as_ref())
            .map(|d| d.sample_millis())
            .unwrap_or(0);

        Self {
            initial_delay: Duration::from_millis(fixed.saturating_add(random)),
            chunked_dribble: definition.chunked_dribble_delay,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.initial_delay.is_zero() && self.chunked_dribble.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when the response was relayed from an upstream server.
    pub from_proxy: bool,
    pub delay: DelayPolicy,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            from_proxy: false,
            delay: DelayPolicy::default(),
        }
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Append headers declared on a response definition, after any already present.
    pub fn append_headers(
        &mut self,
        declared: &BTreeMap<String, HeaderValues>,
    ) -> Result<(), RenderError> {
        for (name, values) in declared {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                RenderError::InvalidDefinition(format!("invalid header name '{name}'"))
            })?;
            for value in values.iter() {
                let value = HeaderValue::from_str(value).map_err(|_| {
                    RenderError::InvalidDefinition(format!("invalid value for header '{name}'"))
                })?;
                self.headers.append(name.clone(), value);
            }
        }
        Ok(())
    }
}
