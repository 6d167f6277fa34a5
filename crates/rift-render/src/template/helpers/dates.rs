//! Date helpers: now, date, parseDate.
//!
//! They return structured date values so a date can be passed on to another
//! helper before it is rendered.

use super::{HelperRegistry, Options};
use crate::error::HelperError;
use crate::template::dates::{self, DateOffset, RenderableDate};
use crate::template::value::Value;
use chrono::{DateTime, Utc};

pub(super) fn register(registry: &mut HelperRegistry) {
    registry.register("now", now);
    registry.register("date", date);
    registry.register("parseDate", parse_date);
}

/// `{{now offset='3 days' format='yyyy-MM-dd' timezone='+02:00'}}`
fn now(_params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    decorate(Utc::now(), options)
}

/// `{{date (parseDate request.headers.X-Date) offset='-1 hours' format='unix'}}`
fn date(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let instant = match params.first() {
        Some(Value::Date(date)) => date.instant,
        Some(value) if !value.is_null() => {
            dates::parse_date(&value.render(), None).map_err(|e| options.error(e))?
        }
        _ => return Err(options.error("expects a date argument")),
    };
    decorate(instant, options)
}

/// `{{parseDate request.query.when format='dd/MM/yyyy'}}`
fn parse_date(params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let input = match params.first() {
        Some(Value::Date(date)) => return Ok(Value::Date(date.clone())),
        Some(value) if !value.is_null() => value.render(),
        _ => return Err(options.error("expects a date string")),
    };
    let format = options.hash_str("format");
    let instant = dates::parse_date(&input, format.as_deref()).map_err(|e| options.error(e))?;
    Ok(Value::Date(RenderableDate::new(instant)))
}

fn decorate(instant: DateTime<Utc>, options: &Options<'_>) -> Result<Value, HelperError> {
    let instant = match options.hash_str("offset") {
        Some(offset) => offset
            .parse::<DateOffset>()
            .and_then(|offset| offset.apply(instant))
            .map_err(|e| options.error(e))?,
        None => instant,
    };
    let offset = options
        .hash_str("timezone")
        .map(|zone| dates::parse_timezone(&zone))
        .transpose()
        .map_err(|e| options.error(e))?;

    Ok(Value::Date(RenderableDate {
        instant,
        format: options.hash_str("format"),
        offset,
    }))
}
