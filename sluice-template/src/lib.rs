//! Sluice Template Engine
//!
//! Expands macros in config values and asset files against a run context.
//!
//! Two dialects share one context:
//! - basic: Go-style `{{ .Key }}` references, missing keys render as `<no value>`
//! - rich: Jinja-style tags, filters, macros, includes; missing keys are errors
//!
//! Both are rendered by minijinja. Basic references are rewritten at parse
//! time and the legacy `list`/`import`/`export` tag forms are translated into
//! their Jinja equivalents.

pub mod dialect;
pub mod engine;
pub mod error;
pub mod filters;
pub mod includes;
pub mod value;

pub use dialect::Dialect;
pub use engine::{DEFAULT_IGNORE_SUFFIXES, JinjaEngine, NO_VALUE, TemplateEngine};
pub use error::{Result, TemplateError, TemplateErrorKind};
pub use filters::{FilterRegistry, TemplateFilter, ToDateFilter};
pub use value::{ContextValue, TemplateContext, TemplateFn};
