//! Template helpers.
//!
//! A helper receives its positional arguments already evaluated, plus an
//! [`Options`] view carrying `key=value` arguments and, for block usage,
//! access to the wrapped content.

mod conditionals;
mod dates;
mod extract;
mod strings;
mod system;

use super::value::Value;
use crate::error::{HelperError, RenderError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

pub use system::SystemKeyAuthoriser;

pub trait Helper: Send + Sync {
    fn call(&self, params: &[Value], options: &Options<'_>) -> Result<Value, HelperError>;
}

impl<F> Helper for F
where
    F: Fn(&[Value], &Options<'_>) -> Result<Value, HelperError> + Send + Sync,
{
    fn call(&self, params: &[Value], options: &Options<'_>) -> Result<Value, HelperError> {
        self(params, options)
    }
}

/// Renders the content of the block a helper was invoked on.
pub(crate) trait BlockContent {
    fn render_body(&self) -> Result<String, RenderError>;
    fn render_inverse(&self) -> Result<String, RenderError>;
}

/// Everything a helper sees besides its positional arguments.
pub struct Options<'a> {
    name: &'a str,
    hash: Vec<(String, Value)>,
    block: Option<&'a dyn BlockContent>,
    bindings: RefCell<Vec<(String, Value)>>,
}

impl<'a> Options<'a> {
    pub(crate) fn new(
        name: &'a str,
        hash: Vec<(String, Value)>,
        block: Option<&'a dyn BlockContent>,
    ) -> Self {
        Self {
            name,
            hash,
            block,
            bindings: RefCell::new(Vec::new()),
        }
    }

    pub fn helper_name(&self) -> &str {
        self.name
    }

    pub fn hash(&self, key: &str) -> Option<&Value> {
        self.hash.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn hash_str(&self, key: &str) -> Option<String> {
        self.hash(key).filter(|v| !v.is_null()).map(Value::render)
    }

    /// `true` for a truthy value or the string `"true"`.
    pub fn hash_flag(&self, key: &str) -> bool {
        match self.hash(key) {
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(value) => value.is_truthy(),
            None => false,
        }
    }

    pub fn is_block(&self) -> bool {
        self.block.is_some()
    }

    pub fn render_block(&self) -> Result<String, HelperError> {
        match self.block {
            Some(block) => block.render_body().map_err(|e| self.wrap(e)),
            None => Ok(String::new()),
        }
    }

    pub fn render_inverse(&self) -> Result<String, HelperError> {
        match self.block {
            Some(block) => block.render_inverse().map_err(|e| self.wrap(e)),
            None => Ok(String::new()),
        }
    }

    /// Make `value` resolvable as `name` for the rest of the template.
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().push((name.into(), value));
    }

    pub fn error(&self, message: impl Into<String>) -> HelperError {
        HelperError::new(self.name, message)
    }

    pub(crate) fn into_bindings(self) -> Vec<(String, Value)> {
        self.bindings.into_inner()
    }

    fn wrap(&self, err: RenderError) -> HelperError {
        match err {
            RenderError::HelperEvaluation(inner) => inner,
            other => self.error(other.to_string()),
        }
    }
}

/// The helper's text input: the rendered block body, else the first argument.
pub(crate) fn text_input(params: &[Value], options: &Options<'_>) -> Result<String, HelperError> {
    if options.is_block() {
        options.render_block()
    } else {
        Ok(params.first().map(Value::render).unwrap_or_default())
    }
}

/// Helpers by name.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Arc<dyn Helper>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard helper set.
    pub fn with_defaults(system_keys: SystemKeyAuthoriser) -> Self {
        let mut registry = Self::new();
        strings::register(&mut registry);
        conditionals::register(&mut registry);
        extract::register(&mut registry);
        dates::register(&mut registry);
        system::register(&mut registry, system_keys);
        registry
    }

    /// Register (or replace) a helper.
    pub fn register(&mut self, name: impl Into<String>, helper: impl Helper + 'static) {
        self.helpers.insert(name.into(), Arc::new(helper));
    }

    /// Take every helper from `other`, replacing same-named ones.
    pub fn extend(&mut self, other: HelperRegistry) {
        self.helpers.extend(other.helpers);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Helper>> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}
