//! randomValue and systemValue helpers.

use super::{HelperRegistry, Options};
use crate::error::HelperError;
use crate::template::value::Value;
use rand::distributions::{Alphanumeric, Uniform};
use rand::Rng;
use regex::{Regex, RegexBuilder};

const ALPHABETIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEXADECIMAL: &[u8] = b"0123456789abcdef";
const SYMBOLS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_{|}~";

pub(super) fn register(registry: &mut HelperRegistry, keys: SystemKeyAuthoriser) {
    registry.register("randomValue", random_value);
    registry.register("systemValue", SystemValue { keys });
}

/// Wildcard allowlist (`*` only, case-insensitive) for `systemValue` keys.
#[derive(Debug, Clone)]
pub struct SystemKeyAuthoriser {
    patterns: Vec<Regex>,
}

impl SystemKeyAuthoriser {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .filter_map(|p| {
                let expression = format!("^{}$", regex::escape(p.trim()).replace(r"\*", ".*"));
                RegexBuilder::new(&expression)
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn is_permitted(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(key))
    }
}

/// `{{randomValue length=10 type='ALPHANUMERIC' uppercase=true}}`
fn random_value(_params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
    let length = match options.hash("length") {
        Some(value) => value
            .as_f64()
            .filter(|n| *n >= 0.0)
            .map(|n| n as usize)
            .ok_or_else(|| options.error("length must be a non-negative number"))?,
        None => 36,
    };
    let kind = options
        .hash_str("type")
        .unwrap_or_else(|| "ALPHANUMERIC".to_string())
        .to_ascii_uppercase();

    let mut rng = rand::thread_rng();
    let value = match kind.as_str() {
        "UUID" => uuid::Uuid::new_v4().to_string(),
        "ALPHANUMERIC" => (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect(),
        "ALPHABETIC" => pick(&mut rng, ALPHABETIC, length),
        "NUMERIC" => (&mut rng)
            .sample_iter(Uniform::new_inclusive(0u8, 9))
            .take(length)
            .map(|d| char::from(b'0' + d))
            .collect(),
        "HEXADECIMAL" => pick(&mut rng, HEXADECIMAL, length),
        "ALPHANUMERIC_AND_SYMBOLS" => pick(&mut rng, SYMBOLS, length),
        other => return Err(options.error(format!("unknown random value type '{other}'"))),
    };

    if options.hash_flag("uppercase") {
        Ok(Value::String(value.to_uppercase()))
    } else {
        Ok(Value::String(value))
    }
}

fn pick(rng: &mut impl Rng, alphabet: &[u8], length: usize) -> String {
    (0..length)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}

/// `{{systemValue type='ENVIRONMENT' key='HOME' default='n/a'}}`
struct SystemValue {
    keys: SystemKeyAuthoriser,
}

impl super::Helper for SystemValue {
    fn call(&self, _params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
        let key = options
            .hash_str("key")
            .ok_or_else(|| options.error("requires a 'key' option"))?;
        if !self.keys.is_permitted(&key) {
            return Ok(Value::String(format!("[ERROR: Access to {key} is denied]")));
        }

        let kind = options
            .hash_str("type")
            .unwrap_or_else(|| "ENVIRONMENT".to_string())
            .to_ascii_uppercase();
        let found = match kind.as_str() {
            "ENVIRONMENT" => std::env::var(&key).ok(),
            "PROPERTY" => process_property(&key),
            other => return Err(options.error(format!("unknown system value type '{other}'"))),
        };

        Ok(found
            .map(Value::String)
            .or_else(|| options.hash("default").cloned())
            .unwrap_or(Value::Null))
    }
}

/// Process-level values exposed under the familiar JVM property names.
fn process_property(key: &str) -> Option<String> {
    match key {
        "os.name" => Some(std::env::consts::OS.to_string()),
        "os.arch" => Some(std::env::consts::ARCH.to_string()),
        "file.separator" => Some(std::path::MAIN_SEPARATOR.to_string()),
        "line.separator" => Some(if cfg!(windows) { "\r\n" } else { "\n" }.to_string()),
        "user.dir" => std::env::current_dir()
            .ok()
            .map(|dir| dir.display().to_string()),
        "user.home" => std::env::var("HOME").ok(),
        "user.name" => std::env::var("USER").ok(),
        _ => None,
    }
}
