//! Template evaluation.
//!
//! Templates are compiled once per distinct source string (see
//! [`TemplateCache`]) and evaluated against a [`TemplateContext`] plus the
//! static `parameters` map. Two names are visible at the top level:
//! `request` and `parameters`. Helpers like `formData` add more through
//! bindings that live for the rest of a single evaluation.

use super::cache::{CompiledTemplate, TemplateCache};
use super::context::TemplateContext;
use super::helpers::{BlockContent, Helper, HelperRegistry, Options, SystemKeyAuthoriser};
use super::parser::{self, Block, Expr, Node, PathExpr, PathRoot};
use super::value::{Value, ValueMap};
use crate::error::{RenderError, TemplateError};
use crate::registry::StubLifecycleListener;
use crate::stub::StubMapping;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct TemplateEngine {
    helpers: HelperRegistry,
    cache: TemplateCache,
    escape_html: bool,
}

pub struct TemplateEngineBuilder {
    escape_html: bool,
    max_cache_entries: Option<i64>,
    permitted_system_keys: Vec<String>,
    custom_helpers: HelperRegistry,
}

impl Default for TemplateEngineBuilder {
    fn default() -> Self {
        Self {
            escape_html: true,
            max_cache_entries: None,
            permitted_system_keys: vec!["rift.*".to_string()],
            custom_helpers: HelperRegistry::new(),
        }
    }
}

impl TemplateEngineBuilder {
    /// HTML-escape `{{double-stash}}` output (default on).
    pub fn escape_html(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }

    /// Bound the compiled template cache. `None` is unbounded, 0 disables it.
    pub fn max_cache_entries(mut self, max: Option<i64>) -> Self {
        self.max_cache_entries = max;
        self
    }

    /// Key patterns `systemValue` may read. Empty keeps the default `rift.*`.
    pub fn permitted_system_keys(mut self, keys: &[String]) -> Self {
        if !keys.is_empty() {
            self.permitted_system_keys = keys.to_vec();
        }
        self
    }

    /// Register a custom helper; it replaces a built-in of the same name.
    pub fn helper(mut self, name: impl Into<String>, helper: impl Helper + 'static) -> Self {
        self.custom_helpers.register(name, helper);
        self
    }

    pub fn build(self) -> Result<TemplateEngine, RenderError> {
        let max_entries = match self.max_cache_entries {
            Some(max) if max < 0 => return Err(RenderError::CacheConfiguration(max)),
            Some(max) => {
                Some(usize::try_from(max).map_err(|_| RenderError::CacheConfiguration(max))?)
            }
            None => None,
        };
        let mut helpers =
            HelperRegistry::with_defaults(SystemKeyAuthoriser::new(&self.permitted_system_keys));
        helpers.extend(self.custom_helpers);

        debug!(
            "Template engine ready: {} helpers, cache bound {:?}, escaping {}",
            helpers.len(),
            max_entries,
            self.escape_html
        );
        Ok(TemplateEngine {
            helpers,
            cache: TemplateCache::new(max_entries),
            escape_html: self.escape_html,
        })
    }
}

impl TemplateEngine {
    pub fn builder() -> TemplateEngineBuilder {
        TemplateEngineBuilder::default()
    }

    /// Compile `source`, or fetch it from the cache.
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        self.cache.get_or_compile(source, |source| {
            trace!("Compiling template ({} chars)", source.len());
            let is_helper = |name: &str| self.helpers.contains(name);
            let nodes = parser::parse(source, &is_helper)?;
            Ok(CompiledTemplate { nodes })
        })
    }

    /// Render `source` to text.
    pub fn evaluate(
        &self,
        source: &str,
        context: &TemplateContext,
        parameters: &ValueMap,
    ) -> Result<String, RenderError> {
        let template = self.compile(source)?;
        let evaluation = Evaluation::new(self, context, parameters);
        let mut out = String::with_capacity(source.len());
        evaluation.render_nodes(&template.nodes, None, &mut out)?;
        Ok(out)
    }

    /// Like [`evaluate`](Self::evaluate), but a template consisting of a single
    /// expression yields that expression's value unrendered (a date stays a date).
    pub fn evaluate_to_value(
        &self,
        source: &str,
        context: &TemplateContext,
        parameters: &ValueMap,
    ) -> Result<Value, RenderError> {
        let template = self.compile(source)?;
        let evaluation = Evaluation::new(self, context, parameters);
        if let [Node::Expression { expr, .. }] = template.nodes.as_slice() {
            return evaluation.eval(expr, None);
        }
        let mut out = String::with_capacity(source.len());
        evaluation.render_nodes(&template.nodes, None, &mut out)?;
        Ok(Value::String(out))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl StubLifecycleListener for TemplateEngine {
    fn after_stubs_reset(&self) {
        debug!("Stubs reset, clearing {} compiled templates", self.cache.len());
        self.cache.clear();
    }

    fn after_stub_removed(&self, stub: &StubMapping) {
        debug!("Stub {:?} removed, clearing compiled templates", stub.id);
        self.cache.clear();
    }
}

/// HTML-escape the characters Handlebars escapes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            other => out.push(other),
        }
    }
    out
}

/// Block iteration scope (`each` / `with`).
struct Frame<'f> {
    value: Value,
    data: Vec<(&'static str, Value)>,
    parent: Option<&'f Frame<'f>>,
}

/// State of one evaluation.
struct Evaluation<'e> {
    engine: &'e TemplateEngine,
    request: &'e Value,
    parameters: &'e ValueMap,
    locals: RefCell<ValueMap>,
}

impl<'e> Evaluation<'e> {
    fn new(
        engine: &'e TemplateEngine,
        context: &'e TemplateContext,
        parameters: &'e ValueMap,
    ) -> Self {
        Self {
            engine,
            request: context.request(),
            parameters,
            locals: RefCell::new(ValueMap::new()),
        }
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        frame: Option<&Frame<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Expression { expr, escape } => {
                    let rendered = self.eval(expr, frame)?.render();
                    if *escape && self.engine.escape_html {
                        out.push_str(&escape_html(&rendered));
                    } else {
                        out.push_str(&rendered);
                    }
                }
                Node::Block(block) => self.render_block(block, frame, out)?,
            }
        }
        Ok(())
    }

    fn render_to_string(
        &self,
        nodes: &[Node],
        frame: Option<&Frame<'_>>,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render_nodes(nodes, frame, &mut out)?;
        Ok(out)
    }

    fn render_block(
        &self,
        block: &Block,
        frame: Option<&Frame<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match block.name.as_str() {
            "if" | "unless" => {
                let condition = self.eval(&block.params[0], frame)?.is_truthy();
                let branch = if condition == (block.name == "if") {
                    &block.body
                } else {
                    &block.inverse
                };
                self.render_nodes(branch, frame, out)
            }
            "with" => {
                let value = self.eval(&block.params[0], frame)?;
                if !value.is_truthy() {
                    return self.render_nodes(&block.inverse, frame, out);
                }
                let inner = Frame {
                    value,
                    data: Vec::new(),
                    parent: frame,
                };
                self.render_nodes(&block.body, Some(&inner), out)
            }
            "each" => {
                let value = self.eval(&block.params[0], frame)?;
                let entries: Vec<(Option<String>, Value)> = match &value {
                    Value::Map(map) => map
                        .iter()
                        .map(|(k, v)| (Some(k.clone()), v.clone()))
                        .collect(),
                    other => other
                        .items()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|v| (None, v))
                        .collect(),
                };
                if entries.is_empty() {
                    return self.render_nodes(&block.inverse, frame, out);
                }
                let last = entries.len() - 1;
                for (index, (key, item)) in entries.into_iter().enumerate() {
                    let mut data = vec![
                        ("index", Value::from(index)),
                        ("first", Value::Bool(index == 0)),
                        ("last", Value::Bool(index == last)),
                    ];
                    if let Some(key) = key {
                        data.push(("key", Value::String(key)));
                    }
                    let inner = Frame {
                        value: item,
                        data,
                        parent: frame,
                    };
                    self.render_nodes(&block.body, Some(&inner), out)?;
                }
                Ok(())
            }
            name => {
                let helper = self.helper(name)?;
                let params = self.eval_all(&block.params, frame)?;
                let hash = self.eval_hash(&block.hash, frame)?;
                let content = BlockScope {
                    evaluation: self,
                    block,
                    frame,
                };
                let options = Options::new(name, hash, Some(&content));
                let result = helper.call(&params, &options);
                self.absorb(options);
                out.push_str(&result?.render());
                Ok(())
            }
        }
    }

    fn eval(&self, expr: &Expr, frame: Option<&Frame<'_>>) -> Result<Value, RenderError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => Ok(self.resolve(path, frame)),
            Expr::Helper { name, params, hash } => {
                let helper = self.helper(name)?;
                let params = self.eval_all(params, frame)?;
                let hash = self.eval_hash(hash, frame)?;
                let options = Options::new(name, hash, None);
                let result = helper.call(&params, &options);
                self.absorb(options);
                Ok(result?)
            }
        }
    }

    fn eval_all(
        &self,
        exprs: &[Expr],
        frame: Option<&Frame<'_>>,
    ) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|e| self.eval(e, frame)).collect()
    }

    fn eval_hash(
        &self,
        hash: &[(String, Expr)],
        frame: Option<&Frame<'_>>,
    ) -> Result<Vec<(String, Value)>, RenderError> {
        hash.iter()
            .map(|(key, expr)| Ok((key.clone(), self.eval(expr, frame)?)))
            .collect()
    }

    fn helper(&self, name: &str) -> Result<&'e Arc<dyn Helper>, RenderError> {
        self.engine.helpers.get(name).ok_or_else(|| {
            RenderError::TemplateSyntax(TemplateError {
                line: 0,
                column: 0,
                message: format!("unknown helper '{name}'"),
            })
        })
    }

    /// Keep values a helper bound for later expressions.
    fn absorb(&self, options: Options<'_>) {
        let bindings = options.into_bindings();
        if bindings.is_empty() {
            return;
        }
        let mut locals = self.locals.borrow_mut();
        for (name, value) in bindings {
            locals.insert(name, value);
        }
    }

    fn resolve(&self, path: &PathExpr, frame: Option<&Frame<'_>>) -> Value {
        match path.root {
            PathRoot::This => match frame {
                Some(frame) => descend(&frame.value, &path.segments),
                None => descend(&self.root(), &path.segments),
            },
            PathRoot::Data => {
                let (name, rest) = match path.segments.split_first() {
                    Some(split) => split,
                    None => return Value::Null,
                };
                let mut current = frame;
                while let Some(f) = current {
                    if let Some((_, value)) = f.data.iter().find(|(k, _)| k == name) {
                        return descend(value, rest);
                    }
                    current = f.parent;
                }
                Value::Null
            }
            PathRoot::Lookup => {
                let (first, rest) = match path.segments.split_first() {
                    Some(split) => split,
                    None => return Value::Null,
                };
                let mut current = frame;
                while let Some(f) = current {
                    if let Value::Map(map) = &f.value {
                        if let Some(found) = map.get(first) {
                            return descend(found, rest);
                        }
                    }
                    current = f.parent;
                }
                if let Some(found) = self.locals.borrow().get(first) {
                    return descend(found, rest);
                }
                match first.as_str() {
                    "request" => descend(self.request, rest),
                    "parameters" => descend_map(self.parameters, rest),
                    _ => Value::Null,
                }
            }
        }
    }

    fn root(&self) -> Value {
        Value::Map(
            ValueMap::new()
                .with("request", self.request.clone())
                .with("parameters", Value::Map(self.parameters.clone())),
        )
    }
}

fn descend(start: &Value, segments: &[String]) -> Value {
    match segments.split_first() {
        None => start.clone(),
        Some((first, rest)) => rest
            .iter()
            .fold(start.get(first), |value, segment| value.get(segment)),
    }
}

fn descend_map(map: &ValueMap, segments: &[String]) -> Value {
    match segments.split_first() {
        None => Value::Map(map.clone()),
        Some((first, rest)) => match map.get(first) {
            Some(found) => descend(found, rest),
            None => Value::Null,
        },
    }
}

/// Gives a block helper access to the content it wraps.
struct BlockScope<'s, 'e> {
    evaluation: &'s Evaluation<'e>,
    block: &'s Block,
    frame: Option<&'s Frame<'s>>,
}

impl BlockContent for BlockScope<'_, '_> {
    fn render_body(&self) -> Result<String, RenderError> {
        self.evaluation.render_to_string(&self.block.body, self.frame)
    }

    fn render_inverse(&self) -> Result<String, RenderError> {
        self.evaluation.render_to_string(&self.block.inverse, self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HelperError;
    use crate::request::Request;

    fn engine() -> TemplateEngine {
        TemplateEngine::builder().build().unwrap()
    }

    fn render(engine: &TemplateEngine, source: &str, request: Request) -> String {
        let context = TemplateContext::from_request(&request);
        engine.evaluate(source, &context, &ValueMap::new()).unwrap()
    }

    #[test]
    fn test_plain_text_passthrough() {
        let out = render(&engine(), "no templates here", Request::builder().build());
        assert_eq!(out, "no templates here");
    }

    #[test]
    fn test_escaping_default_and_raw() {
        let request = Request::builder().body("<it's>").build();
        let engine = engine();
        assert_eq!(render(&engine, "{{request.body}}", request.clone()), "&lt;it&#x27;s&gt;");
        assert_eq!(render(&engine, "{{{request.body}}}", request), "<it's>");
    }

    #[test]
    fn test_escaping_disabled() {
        let engine = TemplateEngine::builder().escape_html(false).build().unwrap();
        let request = Request::builder().body("<b>").build();
        assert_eq!(render(&engine, "{{request.body}}", request), "<b>");
    }

    #[test]
    fn test_parameters_namespace() {
        let engine = engine();
        let context = TemplateContext::from_request(&Request::builder().build());
        let parameters = ValueMap::new().with("greeting", "hello".into());
        let out = engine
            .evaluate(
                "{{parameters.greeting}}-{{parameters.missing}}-",
                &context,
                &parameters,
            )
            .unwrap();
        assert_eq!(out, "hello--");
    }

    #[test]
    fn test_non_ascii_names() {
        let engine = engine();
        let context = TemplateContext::from_request(&Request::builder().build());
        let parameters = ValueMap::new().with("café", "au lait".into());
        let out = engine
            .evaluate("{{parameters.café}}|{{parameters.thé}}", &context, &parameters)
            .unwrap();
        assert_eq!(out, "au lait|");

        let err = engine.evaluate("{{ é", &context, &parameters).unwrap_err();
        assert!(matches!(err, RenderError::TemplateSyntax(_)));
    }

    #[test]
    fn test_builtin_blocks() {
        let engine = engine();
        let request = Request::builder().url("/a/b/c?flag=1").build();
        assert_eq!(
            render(
                &engine,
                "{{#each request.path}}[{{@index}}:{{this}}]{{/each}}",
                request.clone()
            ),
            "[0:a][1:b][2:c]"
        );
        assert_eq!(
            render(
                &engine,
                "{{#if request.query.flag}}on{{else}}off{{/if}}|{{#unless request.query.nope}}absent{{/unless}}",
                request.clone()
            ),
            "on|absent"
        );
        assert_eq!(
            render(
                &engine,
                "{{#with request.requestLine}}{{scheme}}://{{host}}{{/with}}",
                request.clone()
            ),
            "http://localhost"
        );
        assert_eq!(
            render(&engine, "{{#each request.query.none}}x{{else}}empty{{/each}}", request),
            "empty"
        );
    }

    #[test]
    fn test_each_over_map_exposes_key() {
        let engine = engine();
        let request = Request::builder().url("/?a=1&b=2").build();
        assert_eq!(
            render(
                &engine,
                "{{#each request.query}}{{@key}}={{this}}{{#unless @last}},{{/unless}}{{/each}}",
                request
            ),
            "a=1,b=2"
        );
    }

    #[test]
    fn test_sub_expressions() {
        let engine = engine();
        let request = Request::builder().url("/a/b").build();
        assert_eq!(
            render(&engine, "{{eq (size request.path) 2 yes='two' no='other'}}", request),
            "two"
        );
    }

    #[test]
    fn test_bindings_visible_later() {
        let engine = engine();
        let request = Request::builder().body("abc-DEF-123").build();
        assert_eq!(
            render(
                &engine,
                "{{regexExtract request.body '([a-z]+)-([A-Z]+)-([0-9]+)' 'parts'}}{{parts.0}},{{parts.1}},{{parts.2}}",
                request
            ),
            "abc,DEF,123"
        );
    }

    #[test]
    fn test_custom_helper() {
        let engine = TemplateEngine::builder()
            .helper(
                "shout",
                |params: &[Value], _options: &Options<'_>| -> Result<Value, HelperError> {
                    Ok(Value::String(
                        params.first().map(Value::render).unwrap_or_default().to_uppercase(),
                    ))
                },
            )
            .build()
            .unwrap();
        let request = Request::builder().body("quiet").build();
        assert_eq!(render(&engine, "{{shout request.body}}", request), "QUIET");
    }

    #[test]
    fn test_evaluate_to_value_keeps_dates() {
        let engine = engine();
        let context = TemplateContext::from_request(&Request::builder().build());
        let value = engine
            .evaluate_to_value("{{parseDate '2018-05-01T01:02:03Z'}}", &context, &ValueMap::new())
            .unwrap();
        assert!(matches!(value, Value::Date(_)));

        let value = engine
            .evaluate_to_value(
                "at {{parseDate '2018-05-01T01:02:03Z'}}",
                &context,
                &ValueMap::new(),
            )
            .unwrap();
        assert_eq!(value, Value::String("at 2018-05-01T01:02:03Z".to_string()));
    }

    #[test]
    fn test_syntax_error_surfaces() {
        let engine = engine();
        let context = TemplateContext::from_request(&Request::builder().build());
        let err = engine
            .evaluate("{{#if request.body}}unclosed", &context, &ValueMap::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateSyntax(_)));

        let err = engine
            .evaluate("{{#mystery}}x{{/mystery}}", &context, &ValueMap::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateSyntax(_)));
    }

    #[test]
    fn test_helper_error_surfaces() {
        let engine = engine();
        let context = TemplateContext::from_request(&Request::builder().build());
        let err = engine
            .evaluate("{{parseDate 'not-a-date'}}", &context, &ValueMap::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::HelperEvaluation(_)));
    }

    #[test]
    fn test_cache_reuse_and_invalidation() {
        let engine = engine();
        let request = Request::builder().build();
        render(&engine, "{{request.url}}", request.clone());
        render(&engine, "{{request.url}}", request.clone());
        assert_eq!(engine.cache_size(), 1);
        render(&engine, "{{request.method}}", request);
        assert_eq!(engine.cache_size(), 2);

        engine.after_stubs_reset();
        assert_eq!(engine.cache_size(), 0);
    }

    #[test]
    fn test_negative_cache_bound_rejected() {
        let result = TemplateEngine::builder().max_cache_entries(Some(-1)).build();
        assert!(matches!(result, Err(RenderError::CacheConfiguration(-1))));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a&b<c>\"'`="), "a&amp;b&lt;c&gt;&quot;&#x27;&#x60;&#x3D;");
    }
}
