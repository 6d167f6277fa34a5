//! String transform helpers: capitalize, trim, size, base64, urlEncode.

use super::{text_input, HelperRegistry, Options};
use crate::error::HelperError;
use crate::template::value::Value;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

pub(super) fn register(registry: &mut HelperRegistry) {
    registry.register("capitalize", capitalize);
    registry.register("trim", trim);
    registry.register("size", size);
    registry.register("base64", base64_helper);
    registry.register("urlEncode", url_encode);
}

fn capitalize(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let input = text_input(params, options)?;
    let mut out = String::with_capacity(input.len());
    let mut word_start = true;
    for c in input.chars() {
        if word_start && !c.is_whitespace() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = c.is_whitespace();
    }
    Ok(Value::String(out))
}

fn trim(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let input = text_input(params, options)?;
    Ok(Value::String(input.trim().to_string()))
}

fn size(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    match params.first() {
        None | Some(Value::Null) => Ok(Value::Int(0)),
        Some(value) => value
            .size()
            .map(Value::from)
            .ok_or_else(|| options.error("expects a string, list or map")),
    }
}

fn base64_helper(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let input = text_input(params, options)?;
    if options.hash_flag("decode") {
        let decoded = STANDARD
            .decode(input.trim())
            .or_else(|_| STANDARD_NO_PAD.decode(input.trim()))
            .map_err(|e| options.error(format!("invalid base64 input: {e}")))?;
        return Ok(Value::String(String::from_utf8_lossy(&decoded).into_owned()));
    }
    let encoded = if options.hash("padding").is_some() && !options.hash_flag("padding") {
        STANDARD_NO_PAD.encode(input.as_bytes())
    } else {
        STANDARD.encode(input.as_bytes())
    };
    Ok(Value::String(encoded))
}

/// Form-style percent encoding: spaces become `+`.
fn url_encode(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let input = text_input(params, options)?;
    if options.hash_flag("decode") {
        let spaced = input.replace('+', " ");
        let decoded = urlencoding::decode(&spaced)
            .map_err(|e| options.error(format!("invalid percent-encoding: {e}")))?;
        return Ok(Value::String(decoded.into_owned()));
    }
    Ok(Value::String(
        urlencoding::encode(&input).replace("%20", "+"),
    ))
}
