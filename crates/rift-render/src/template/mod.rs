//! Handlebars-style response templating.
//!
//! # Module Structure
//!
//! - `parser` - template source to AST
//! - `engine` - evaluation, escaping and the `parameters` namespace
//! - `cache` - bounded compiled-template cache
//! - `context` - the `request` model built from an inbound request
//! - `value` - dynamic values templates operate on
//! - `dates` - date parsing, formatting and offsets
//! - `helpers` - built-in helper library

mod cache;
mod context;
mod dates;
mod engine;
pub mod helpers;
mod parser;
mod value;

pub use cache::{CompiledTemplate, TemplateCache};
pub use context::TemplateContext;
pub use dates::RenderableDate;
pub use engine::{escape_html, TemplateEngine, TemplateEngineBuilder};
pub use helpers::{Helper, HelperRegistry, Options, SystemKeyAuthoriser};
pub use value::{MultiValue, PathValue, Value, ValueMap};
