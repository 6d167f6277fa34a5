//! Dynamic values flowing through templates.

use super::dates::RenderableDate;
use serde_json::Value as JsonValue;
use std::fmt::Write;

/// A value a template expression can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    /// Multi-valued request attribute (header, query parameter, cookie, form field).
    Multi(MultiValue),
    /// URL path that renders as itself but indexes into its segments.
    Path(PathValue),
    Map(ValueMap),
    Date(RenderableDate),
}

/// Ordered list of values that renders as its first entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiValue {
    values: Vec<String>,
}

impl MultiValue {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    raw: String,
    segments: Vec<String>,
}

impl PathValue {
    /// Split `/a/b/c` into `a`, `b`, `c`. The root path has one empty segment.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.strip_prefix('/').unwrap_or(&raw);
        let segments = trimmed.split('/').map(str::to_string).collect();
        Self { raw, segments }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Insertion-ordered map, optionally matching keys case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
    case_insensitive: bool,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: true,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.position(&key) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    fn position(&self, key: &str) -> Option<usize> {
        if self.case_insensitive {
            self.entries
                .iter()
                .position(|(k, _)| k.eq_ignore_ascii_case(key))
        } else {
            self.entries.iter().position(|(k, _)| k == key)
        }
    }
}

impl Value {
    /// Text emitted when the value is interpolated into a template.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Multi(multi) => multi.first().unwrap_or_default().to_string(),
            Value::Path(path) => path.raw.clone(),
            Value::Map(map) => {
                let mut out = String::from("{");
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}={}", key, value.render());
                }
                out.push('}');
                out
            }
            Value::Date(date) => date.render(),
        }
    }

    /// Handlebars truthiness: null, false, 0, "" and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Multi(multi) => !multi.values.is_empty(),
            Value::Path(_) | Value::Date(_) => true,
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Element view of list-like values.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::Multi(multi) => Some(multi.values.iter().cloned().map(Value::String).collect()),
            Value::Path(path) => Some(path.segments.iter().cloned().map(Value::String).collect()),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Multi(multi) => Some(multi.values.len()),
            Value::Path(path) => Some(path.segments.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Property access used by path expressions (`a.b`, `a.[0]`, `a.first`).
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.get(key).cloned().unwrap_or(Value::Null),
            Value::List(_) | Value::Multi(_) | Value::Path(_) => {
                if let Ok(index) = key.parse::<i64>() {
                    return self.index(index);
                }
                let items = self.items().unwrap_or_default();
                match key {
                    "first" => items.into_iter().next().unwrap_or(Value::Null),
                    "last" => items.into_iter().last().unwrap_or(Value::Null),
                    "size" | "length" => Value::Int(self.size().unwrap_or(0) as i64),
                    _ => Value::Null,
                }
            }
            _ => Value::Null,
        }
    }

    /// Positional access. Negative indices count back from the second-to-last
    /// element: `-1` on four items selects the third.
    pub fn index(&self, index: i64) -> Value {
        let items = match self.items() {
            Some(items) => items,
            None => return Value::Null,
        };
        let position = if index >= 0 {
            Some(index)
        } else {
            (items.len() as i64 - 1).checked_add(index)
        };
        let position = match position {
            Some(position) if position >= 0 => position,
            _ => return Value::Null,
        };
        items
            .into_iter()
            .nth(position as usize)
            .unwrap_or(Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Multi(multi) => multi.first(),
            Value::Path(path) => Some(&path.raw),
            _ => None,
        }
    }

    /// Numeric view; numeric strings count as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) | Value::Multi(_) => self.as_str()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            JsonValue::Object(fields) => {
                let mut map = ValueMap::new();
                for (key, value) in fields {
                    map.insert(key.clone(), Value::from(value));
                }
                Value::Map(map)
            }
        }
    }
}
