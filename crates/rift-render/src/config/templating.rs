//! Response templating settings.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplatingConfig {
    /// Template every response, not only stubs naming the transformer.
    #[serde(default)]
    pub global: bool,

    /// HTML-escape `{{double-stash}}` output.
    #[serde(default = "default_escape_html")]
    pub escape_html: bool,

    /// Compiled template cache bound. Unset means unbounded, 0 disables caching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cache_entries: Option<i64>,

    /// Wildcard patterns (`*` only) of environment variable and system
    /// property names the `systemValue` helper may read.
    #[serde(default = "default_permitted_system_keys")]
    pub permitted_system_keys: Vec<String>,

    /// Values visible as `parameters.*` in every template. Per-stub
    /// transformer parameters override these.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, JsonValue>,
}

impl Default for TemplatingConfig {
    fn default() -> Self {
        Self {
            global: false,
            escape_html: default_escape_html(),
            max_cache_entries: None,
            permitted_system_keys: default_permitted_system_keys(),
            parameters: BTreeMap::new(),
        }
    }
}

fn default_escape_html() -> bool {
    true
}

fn default_permitted_system_keys() -> Vec<String> {
    vec!["rift.*".to_string()]
}
