//! Builds the `request` model templates read from.
//!
//! Building never fails: absent parts of the request become empty maps,
//! empty strings or empty lists.

use super::value::{MultiValue, PathValue, Value, ValueMap};
use crate::request::Request;

/// Read-only data a template is evaluated against.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    request: Value,
}

impl TemplateContext {
    pub fn from_request(request: &Request) -> Self {
        let query = Value::Map(group(request.query_params(), ValueMap::new()));

        let mut header_pairs = Vec::new();
        for name in request.headers().keys() {
            for value in request.header_values(name.as_str()) {
                header_pairs.push((name.as_str().to_string(), value));
            }
        }
        let headers = Value::Map(group(header_pairs, ValueMap::case_insensitive()));
        let cookies = Value::Map(group(request.cookies().to_vec(), ValueMap::new()));

        let request_line = ValueMap::new()
            .with("method", request.method().as_str().into())
            .with("scheme", request.scheme().into())
            .with("host", request.host().into())
            .with("port", Value::Int(i64::from(request.port())))
            .with("path", request.url().into())
            .with("pathSegments", Value::Path(PathValue::new(request.path())))
            .with("query", query.clone())
            .with("baseUrl", request.base_url().into());

        let model = ValueMap::new()
            .with("url", request.url().into())
            .with("method", request.method().as_str().into())
            .with("path", Value::Path(PathValue::new(request.path())))
            .with("query", query)
            .with("headers", headers)
            .with("cookies", cookies)
            .with("body", request.body_as_string().into())
            .with("requestLine", Value::Map(request_line));

        Self {
            request: Value::Map(model),
        }
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    /// Resolve a dotted path below `request`, e.g. `query.name.0`.
    pub fn lookup(&self, path: &str) -> Value {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .fold(self.request.clone(), |value, segment| value.get(segment))
    }
}

/// Group pairs by name, keeping first-seen name order and value order.
fn group(pairs: Vec<(String, String)>, mut map: ValueMap) -> ValueMap {
    let insensitive = map.is_case_insensitive();
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in pairs {
        let existing = grouped.iter_mut().find(|(n, _)| {
            if insensitive {
                n.eq_ignore_ascii_case(&name)
            } else {
                *n == name
            }
        });
        match existing {
            Some((_, values)) => values.push(value),
            None => grouped.push((name, vec![value])),
        }
    }
    for (name, values) in grouped {
        map.insert(name, Value::Multi(MultiValue::new(values)));
    }
    map
}
