//! Stub definitions: what to match, and how to respond.
//!
//! Mappings are JSON/YAML documents with a `request` and a `response` part
//! and camelCase field names.

use crate::request::Request;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Name of the response-templating transformer.
pub const RESPONSE_TEMPLATE: &str = "response-template";

/// A stub: a request pattern plus the response to produce when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub request: RequestPattern,
    pub response: ResponseDefinition,
}

impl StubMapping {
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            id: None,
            request,
            response,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Minimal request matching: method plus exact URL or exact path.
///
/// With neither `url` nor `urlPath` set, any URL matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
}

impl RequestPattern {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn url(method: &str, url: &str) -> Self {
        Self {
            method: Some(method.to_string()),
            url: Some(url.to_string()),
            url_path: None,
        }
    }

    pub fn url_path(method: &str, path: &str) -> Self {
        Self {
            method: Some(method.to_string()),
            url: None,
            url_path: Some(path.to_string()),
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        let method_ok = match self.method.as_deref() {
            None | Some("ANY") => true,
            Some(method) => request.method().as_str().eq_ignore_ascii_case(method),
        };
        if !method_ok {
            return false;
        }
        if let Some(url) = &self.url {
            return request.url() == url;
        }
        if let Some(path) = &self.url_path {
            return request.path() == path;
        }
        true
    }
}

/// Declarative description of a response.
///
/// String fields may contain templates when the response-template
/// transformer applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseDefinition {
    pub status: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_base_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_proxy_request_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_delay_milliseconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_distribution: Option<DelayDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunked_dribble_delay: Option<ChunkedDribbleDelay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub transformer_parameters: BTreeMap<String, JsonValue>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: None,
            base64_body: None,
            body_file_name: None,
            proxy_base_url: None,
            additional_proxy_request_headers: BTreeMap::new(),
            fixed_delay_milliseconds: None,
            delay_distribution: None,
            chunked_dribble_delay: None,
            transformers: Vec::new(),
            transformer_parameters: BTreeMap::new(),
        }
    }
}

impl ResponseDefinition {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_body_file(mut self, name: impl Into<String>) -> Self {
        self.body_file_name = Some(name.into());
        self
    }

    /// Add a header value; repeated calls with the same name accumulate values.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn proxied_from(base_url: impl Into<String>) -> Self {
        Self {
            proxy_base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_additional_request_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.additional_proxy_request_headers
            .insert(name.into(), value.into());
        self
    }

    pub fn with_fixed_delay(mut self, millis: u64) -> Self {
        self.fixed_delay_milliseconds = Some(millis);
        self
    }

    pub fn with_delay_distribution(mut self, distribution: DelayDistribution) -> Self {
        self.delay_distribution = Some(distribution);
        self
    }

    pub fn with_chunked_dribble_delay(
        mut self,
        number_of_chunks: u32,
        total_duration: u64,
    ) -> Self {
        self.chunked_dribble_delay = Some(ChunkedDribbleDelay {
            number_of_chunks,
            total_duration,
        });
        self
    }

    pub fn with_transformers(mut self, names: &[&str]) -> Self {
        self.transformers = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_transformer_parameter(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.transformer_parameters.insert(name.into(), value);
        self
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy_base_url.is_some()
    }

    pub fn has_transformer(&self, name: &str) -> bool {
        self.transformers.iter().any(|t| t == name)
    }
}

/// One or more values for a configured header.
///
/// Deserializes from either a string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "OneOrMany")]
pub struct HeaderValues(Vec<String>);

impl HeaderValues {
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    pub fn push(&mut self, value: String) {
        self.0.push(value);
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for HeaderValues {
    fn from(raw: OneOrMany) -> Self {
        match raw {
            OneOrMany::One(value) => Self(vec![value]),
            OneOrMany::Many(values) => Self(values),
        }
    }
}

impl From<HeaderValues> for OneOrMany {
    fn from(values: HeaderValues) -> Self {
        let mut values = values.0;
        if values.len() == 1 {
            OneOrMany::One(values.remove(0))
        } else {
            OneOrMany::Many(values)
        }
    }
}

/// Random delay distribution, sampled once per response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DelayDistribution {
    /// Log-normal with the given median (ms) and sigma.
    Lognormal { median: f64, sigma: f64 },
    /// Uniform between `lower` and `upper` ms, inclusive.
    Uniform { lower: u64, upper: u64 },
}

impl DelayDistribution {
    pub fn sample_millis(&self) -> u64 {
        let mut rng = rand::thread_rng();
        match *self {
            DelayDistribution::Lognormal { median, sigma } => {
                // Box-Muller standard normal
                let u1: f64 = 1.0 - rng.gen::<f64>();
                let u2: f64 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                let sample = median * (sigma * z).exp();
                if sample.is_finite() && sample > 0.0 {
                    sample.round() as u64
                } else {
                    0
                }
            }
            DelayDistribution::Uniform { lower, upper } => {
                if upper <= lower {
                    lower
                } else {
                    rng.gen_range(lower..=upper)
                }
            }
        }
    }
}

/// Deliver the body in `number_of_chunks` pieces spread over `total_duration` ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedDribbleDelay {
    pub number_of_chunks: u32,
    pub total_duration: u64,
}
