//! Comparison helpers: eq, neq, gt, gte, lt, lte.
//!
//! Inline, they yield the `yes`/`no` hash values (or `true`/`false`). As
//! blocks, they render the body or the `{{else}}` branch.

use super::{HelperRegistry, Options};
use crate::error::HelperError;
use crate::template::value::Value;
use std::cmp::Ordering;

pub(super) fn register(registry: &mut HelperRegistry) {
    registry.register("eq", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord == Ordering::Equal)
    });
    registry.register("neq", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord != Ordering::Equal)
    });
    registry.register("gt", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord == Ordering::Greater)
    });
    registry.register("gte", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord != Ordering::Less)
    });
    registry.register("lt", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord == Ordering::Less)
    });
    registry.register("lte", |p: &[Value], o: &Options<'_>| {
        conditional(p, o, |ord| ord != Ordering::Greater)
    });
}

fn conditional(
    params: &[Value],
    options: &Options<'_>,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, HelperError> {
    if params.len() != 2 {
        return Err(options.error(format!("expects 2 arguments, got {}", params.len())));
    }
    let holds = compare(&params[0], &params[1]).map(accept).unwrap_or(false);

    if options.is_block() {
        let rendered = if holds {
            options.render_block()?
        } else {
            options.render_inverse()?
        };
        return Ok(Value::String(rendered));
    }

    let (key, fallback) = if holds { ("yes", true) } else { ("no", false) };
    Ok(options
        .hash(key)
        .cloned()
        .unwrap_or(Value::Bool(fallback)))
}

/// Numeric comparison when either side is a number and both read as numbers,
/// otherwise compare rendered text.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_number() || right.is_number() {
        if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
            return l.partial_cmp(&r);
        }
    }
    Some(left.render().cmp(&right.render()))
}
