//! Extraction helpers: formData, regexExtract, jsonPath, xPath.

use super::{HelperRegistry, Options};
use crate::error::HelperError;
use crate::request::parse_form_encoded;
use crate::template::value::{MultiValue, Value, ValueMap};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value as JsonValue;
use serde_json_path::JsonPath;
use std::collections::HashMap;

const MAX_CACHED_PATTERNS: usize = 256;

pub(super) fn register(registry: &mut HelperRegistry) {
    registry.register("formData", form_data);
    registry.register("regexExtract", RegexExtract::default());
    registry.register("jsonPath", json_path);
    registry.register("xPath", xpath);
}

/// `{{formData request.body 'form' urlDecode=true}}` binds `form.<field>`.
/// Without a bind name the parsed map is returned.
fn form_data(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let body = params
        .first()
        .map(Value::render)
        .ok_or_else(|| options.error("expects the form body as first argument"))?;
    let decode = options.hash_flag("urlDecode");

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let (name, value) = if decode {
            parse_form_encoded(pair)
                .into_iter()
                .next()
                .unwrap_or_else(|| (name.to_string(), value.to_string()))
        } else {
            (name.to_string(), value.to_string())
        };
        match grouped.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => grouped.push((name, vec![value])),
        }
    }

    let mut form = ValueMap::new();
    for (name, values) in grouped {
        form.insert(name, Value::Multi(MultiValue::new(values)));
    }

    match params.get(1) {
        Some(bind) => {
            options.bind(bind.render(), Value::Map(form));
            Ok(Value::Null)
        }
        None => Ok(Value::Map(form)),
    }
}

/// `{{regexExtract input 'pattern'}}` yields the first full match.
/// With a bind name, the capture groups of the first match are bound instead:
/// a map for named groups, otherwise a list indexed from 0.
#[derive(Default)]
struct RegexExtract {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl RegexExtract {
    fn regex(&self, pattern: &str, options: &Options<'_>) -> Result<Regex, HelperError> {
        let mut compiled = self.compiled.lock();
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| options.error(format!("invalid regex '{pattern}': {e}")))?;
        if compiled.len() >= MAX_CACHED_PATTERNS {
            compiled.clear();
        }
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl super::Helper for RegexExtract {
    fn call(&self, params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
        if params.len() < 2 {
            return Err(options.error("expects an input and a regex"));
        }
        let input = params[0].render();
        let regex = self.regex(&params[1].render(), options)?;
        let no_match = || {
            options
                .hash("default")
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))
        };

        let bind = match params.get(2) {
            Some(bind) => bind.render(),
            None => {
                return Ok(regex
                    .find(&input)
                    .map(|m| Value::String(m.as_str().to_string()))
                    .unwrap_or_else(no_match));
            }
        };

        let captures = match regex.captures(&input) {
            Some(captures) => captures,
            None => return Ok(no_match()),
        };

        let named: Vec<&str> = regex.capture_names().flatten().collect();
        let bound = if named.is_empty() {
            Value::List(
                captures
                    .iter()
                    .skip(1)
                    .map(|group| {
                        Value::String(group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    })
                    .collect(),
            )
        } else {
            let mut groups = ValueMap::new();
            for name in named {
                let text = captures
                    .name(name)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                groups.insert(name, Value::String(text));
            }
            Value::Map(groups)
        };
        options.bind(bind, bound);
        Ok(Value::Null)
    }
}

/// `{{jsonPath request.body '$.items[0].name'}}`. Objects and arrays render as JSON.
fn json_path(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    if params.len() < 2 {
        return Err(options.error("expects a JSON document and a JSONPath expression"));
    }
    let document = params[0].render();
    let expression = params[1].render();
    let fallback = || options.hash("default").cloned().unwrap_or(Value::Null);

    let path = JsonPath::parse(&expression)
        .map_err(|e| options.error(format!("invalid JSONPath '{expression}': {e}")))?;
    let json: JsonValue = match serde_json::from_str(&document) {
        Ok(json) => json,
        Err(_) if options.hash("default").is_some() => return Ok(fallback()),
        Err(e) => return Err(options.error(format!("input is not valid JSON: {e}"))),
    };

    let nodes = path.query(&json).all();
    match nodes.as_slice() {
        [] => Ok(fallback()),
        [single] => Ok(json_result(single)),
        many => Ok(Value::List(many.iter().map(|node| json_result(node)).collect())),
    }
}

fn json_result(node: &JsonValue) -> Value {
    match node {
        JsonValue::Object(_) | JsonValue::Array(_) => Value::String(node.to_string()),
        scalar => Value::from(scalar),
    }
}

/// `{{xPath request.body '/order/id/text()'}}`: first node's string value.
fn xpath(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    use sxd_document::parser;
    use sxd_xpath::{evaluate_xpath, Value as XPathValue};

    if params.len() < 2 {
        return Err(options.error("expects an XML document and an XPath expression"));
    }
    let document = params[0].render();
    let expression = params[1].render();

    let package = parser::parse(&document).map_err(|_| options.error("input is not valid XML"))?;
    let document = package.as_document();

    match evaluate_xpath(&document, &expression) {
        Ok(XPathValue::String(s)) => Ok(Value::String(s)),
        Ok(XPathValue::Number(n)) => Ok(Value::String(n.to_string())),
        Ok(XPathValue::Boolean(b)) => Ok(Value::Bool(b)),
        Ok(XPathValue::Nodeset(nodes)) => Ok(nodes
            .document_order_first()
            .map(|node| Value::String(node.string_value()))
            .unwrap_or_else(|| options.hash("default").cloned().unwrap_or(Value::Null))),
        Err(e) => Err(options.error(format!("invalid XPath '{expression}': {e}"))),
    }
}
