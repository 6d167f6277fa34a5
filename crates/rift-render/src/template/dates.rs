//! Date parsing and formatting for the date helpers.
//!
//! Formats are given in the `yyyy-MM-dd'T'HH:mm:ss` pattern language and
//! translated to chrono strftime items. `epoch` and `unix`
//! select milliseconds and seconds since the Unix epoch.

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use std::str::FromStr;

const ISO_UTC: &str = "%Y-%m-%dT%H:%M:%SZ";
const ISO_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// A point in time plus the way it should render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableDate {
    pub instant: DateTime<Utc>,
    pub format: Option<String>,
    pub offset: Option<FixedOffset>,
}

impl RenderableDate {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            format: None,
            offset: None,
        }
    }

    pub fn render(&self) -> String {
        format_date(&self.instant, self.format.as_deref(), self.offset)
            .unwrap_or_else(|_| self.instant.format(ISO_UTC).to_string())
    }
}

/// Format `instant` with an optional pattern and timezone offset.
pub fn format_date(
    instant: &DateTime<Utc>,
    format: Option<&str>,
    offset: Option<FixedOffset>,
) -> Result<String, String> {
    match format {
        Some("epoch") => Ok(instant.timestamp_millis().to_string()),
        Some("unix") => Ok(instant.timestamp().to_string()),
        Some(pattern) => {
            let strftime = java_pattern_to_strftime(pattern, false);
            let items = checked_items(&strftime)
                .ok_or_else(|| format!("unsupported date format '{pattern}'"))?;
            let zone = offset.unwrap_or(Utc.fix());
            Ok(instant
                .with_timezone(&zone)
                .format_with_items(items.into_iter())
                .to_string())
        }
        None => match offset {
            Some(zone) => Ok(instant.with_timezone(&zone).format(ISO_OFFSET).to_string()),
            None => Ok(instant.format(ISO_UTC).to_string()),
        },
    }
}

/// Parse `input`. Without a format, ISO-8601 (and RFC 2822) forms are accepted.
pub fn parse_date(input: &str, format: Option<&str>) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    let parsed = match format {
        Some("epoch") => input
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Some("unix") => input
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Some(pattern) => {
            let strftime = java_pattern_to_strftime(pattern, true);
            parse_with(input, &strftime)
        }
        None => DateTime::parse_from_rfc3339(input)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_with(input, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|| parse_with(input, "%Y-%m-%d"))
            .or_else(|| {
                DateTime::parse_from_rfc2822(input)
                    .map(|d| d.with_timezone(&Utc))
                    .ok()
            }),
    };
    parsed.ok_or_else(|| match format {
        Some(pattern) => format!("'{input}' does not match date format '{pattern}'"),
        None => format!("'{input}' is not an ISO-8601 date"),
    })
}

fn parse_with(input: &str, strftime: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_zone) = DateTime::parse_from_str(input, strftime) {
        return Some(with_zone.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, strftime) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(input, strftime)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn checked_items(strftime: &str) -> Option<Vec<Item<'_>>> {
    let items: Vec<Item<'_>> = StrftimeItems::new(strftime).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        None
    } else {
        Some(items)
    }
}

/// Accepts `UTC`, `GMT`, `Z`, and offsets like `+02:00`, `-0530`, `GMT+1`.
pub fn parse_timezone(name: &str) -> Result<FixedOffset, String> {
    let trimmed = name.trim();
    let upper = trimmed.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
        return Ok(Utc.fix());
    }
    let spec = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    let unknown = || format!("unknown timezone '{trimmed}'");
    let (sign, digits) = match spec.chars().next() {
        Some('+') => (1, &spec[1..]),
        Some('-') => (-1, &spec[1..]),
        _ => return Err(unknown()),
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(unknown());
    }
    let (hours, minutes) = if digits.len() <= 2 {
        (digits.parse::<i32>().map_err(|_| unknown())?, 0)
    } else {
        let split = digits.len() - 2;
        (
            digits[..split].parse::<i32>().map_err(|_| unknown())?,
            digits[split..].parse::<i32>().map_err(|_| unknown())?,
        )
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(unknown)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OffsetUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// Relative shift such as `3 days`, `-24 hours` or `+1 month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOffset {
    amount: i64,
    unit: OffsetUnit,
}

impl FromStr for DateOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid date offset '{s}', expected e.g. '3 days'");
        let mut parts = s.split_whitespace();
        let amount = parts.next().ok_or_else(invalid)?;
        let unit = parts.next().ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        let amount = amount
            .trim_start_matches('+')
            .parse::<i64>()
            .map_err(|_| invalid())?;
        let unit = unit.to_ascii_lowercase();
        let unit = match unit.trim_end_matches('s') {
            "second" => OffsetUnit::Seconds,
            "minute" => OffsetUnit::Minutes,
            "hour" => OffsetUnit::Hours,
            "day" => OffsetUnit::Days,
            "week" => OffsetUnit::Weeks,
            "month" => OffsetUnit::Months,
            "year" => OffsetUnit::Years,
            _ => return Err(invalid()),
        };
        Ok(Self { amount, unit })
    }
}

impl DateOffset {
    pub fn apply(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let overflow = || format!("date offset {} overflows", self.amount);
        let shifted = match self.unit {
            OffsetUnit::Seconds => Duration::try_seconds(self.amount),
            OffsetUnit::Minutes => Duration::try_minutes(self.amount),
            OffsetUnit::Hours => Duration::try_hours(self.amount),
            OffsetUnit::Days => Duration::try_days(self.amount),
            OffsetUnit::Weeks => Duration::try_weeks(self.amount),
            OffsetUnit::Months | OffsetUnit::Years => {
                let months = if self.unit == OffsetUnit::Years {
                    self.amount.checked_mul(12).ok_or_else(overflow)?
                } else {
                    self.amount
                };
                let count = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
                let result = if months >= 0 {
                    instant.checked_add_months(Months::new(count))
                } else {
                    instant.checked_sub_months(Months::new(count))
                };
                return result.ok_or_else(overflow);
            }
        };
        shifted
            .and_then(|delta| instant.checked_add_signed(delta))
            .ok_or_else(overflow)
    }
}

/// Translate a `yyyy-MM-dd HH:mm:ss` style pattern into strftime syntax.
///
/// When `parsing`, numeric fields keep their padded form; chrono's parser
/// accepts unpadded input for them anyway.
pub fn java_pattern_to_strftime(pattern: &str, parsing: bool) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // quoted literal; '' is an escaped quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut count = 1;
        while chars.get(i + count) == Some(&c) {
            count += 1;
        }
        i += count;

        let numeric = |padded: &'static str, unpadded: &'static str| {
            if count == 1 && !parsing {
                unpadded
            } else {
                padded
            }
        };
        let spec = match c {
            'y' => {
                if count == 2 {
                    "%y"
                } else {
                    "%Y"
                }
            }
            'u' => {
                if count == 1 {
                    "%u"
                } else {
                    "%Y"
                }
            }
            'M' | 'L' => match count {
                1 => numeric("%m", "%-m"),
                2 => "%m",
                3 => "%b",
                _ => "%B",
            },
            'd' => numeric("%d", "%-d"),
            'D' => "%j",
            'H' => numeric("%H", "%-H"),
            'h' => numeric("%I", "%-I"),
            'm' => numeric("%M", "%-M"),
            's' => numeric("%S", "%-S"),
            'S' => match count {
                1..=3 => "%3f",
                4..=6 => "%6f",
                _ => "%9f",
            },
            'E' => {
                if count <= 3 {
                    "%a"
                } else {
                    "%A"
                }
            }
            'a' => "%p",
            'Z' => "%z",
            'X' | 'x' => {
                if count >= 3 {
                    "%:z"
                } else {
                    "%z"
                }
            }
            'z' => "%Z",
            _ => {
                for _ in 0..count {
                    push_literal(&mut out, c);
                }
                continue;
            }
        };
        out.push_str(spec);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_pattern_translation() {
        assert_eq!(java_pattern_to_strftime("yyyy-MM-dd", false), "%Y-%m-%d");
        assert_eq!(java_pattern_to_strftime("dd/MM/yyyy", true), "%d/%m/%Y");
        assert_eq!(
            java_pattern_to_strftime("yyyy-MM-dd'T'HH:mm:ss.SSSXXX", false),
            "%Y-%m-%dT%H:%M:%S.%3f%:z"
        );
        assert_eq!(
            java_pattern_to_strftime("EEE, d MMM yyyy", false),
            "%a, %-d %b %Y"
        );
        assert_eq!(java_pattern_to_strftime("'it''s' 100%", false), "it's 100%%");
    }

    #[test]
    fn test_format_default_iso() {
        let date = instant("2018-05-01T10:15:00Z");
        assert_eq!(format_date(&date, None, None).unwrap(), "2018-05-01T10:15:00Z");
    }

    #[test]
    fn test_format_pattern_and_zone() {
        let date = instant("2018-05-01T23:15:00Z");
        let zone = parse_timezone("+02:00").unwrap();
        assert_eq!(
            format_date(&date, Some("yyyy-MM-dd HH:mm"), Some(zone)).unwrap(),
            "2018-05-02 01:15"
        );
        assert_eq!(
            format_date(&date, None, Some(zone)).unwrap(),
            "2018-05-02T01:15:00+02:00"
        );
    }

    #[test]
    fn test_format_epoch_and_unix() {
        let date = instant("1970-01-01T00:00:01Z");
        assert_eq!(format_date(&date, Some("epoch"), None).unwrap(), "1000");
        assert_eq!(format_date(&date, Some("unix"), None).unwrap(), "1");
    }

    #[test]
    fn test_parse_iso_variants() {
        assert_eq!(
            parse_date("2018-05-01T01:02:03Z", None).unwrap(),
            instant("2018-05-01T01:02:03Z")
        );
        assert_eq!(
            parse_date("2018-05-01T01:02:03+01:00", None).unwrap(),
            instant("2018-05-01T00:02:03Z")
        );
        assert_eq!(
            parse_date("2018-05-01", None).unwrap(),
            instant("2018-05-01T00:00:00Z")
        );
    }

    #[test]
    fn test_parse_custom_format() {
        let date = parse_date("01/02/2003", Some("dd/MM/yyyy")).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2003, 2, 1));
    }

    #[test]
    fn test_parse_epoch() {
        assert_eq!(
            parse_date("1000", Some("epoch")).unwrap(),
            instant("1970-01-01T00:00:01Z")
        );
    }

    #[test]
    fn test_parse_failure() {
        assert!(parse_date("not a date", None).is_err());
        assert!(parse_date("2003-02-01", Some("dd/MM/yyyy")).is_err());
    }

    #[test]
    fn test_timezones() {
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("-0530").unwrap().local_minus_utc(), -19_800);
        assert_eq!(parse_timezone("GMT+1").unwrap().local_minus_utc(), 3_600);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_offsets() {
        let date = instant("2018-01-31T00:00:00Z");
        let plus_days: DateOffset = "3 days".parse().unwrap();
        assert_eq!(plus_days.apply(date).unwrap(), instant("2018-02-03T00:00:00Z"));

        let minus_hours: DateOffset = "-24 hours".parse().unwrap();
        assert_eq!(minus_hours.apply(date).unwrap(), instant("2018-01-30T00:00:00Z"));

        let plus_month: DateOffset = "1 month".parse().unwrap();
        assert_eq!(plus_month.apply(date).unwrap(), instant("2018-02-28T00:00:00Z"));

        let years: DateOffset = "-2 years".parse().unwrap();
        assert_eq!(years.apply(date).unwrap(), instant("2016-01-31T00:00:00Z"));

        assert!("soon".parse::<DateOffset>().is_err());
        assert!("3 fortnights".parse::<DateOffset>().is_err());
    }
}
