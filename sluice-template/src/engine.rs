//! Template engine

use crate::dialect::{self, Dialect};
use crate::error::{Result, TemplateError};
use crate::filters::{FilterRegistry, TemplateFilter};
use crate::includes;
use crate::value::TemplateContext;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Output, State, UndefinedBehavior};
use sluice_core::time;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// File suffixes passed through without expansion
pub const DEFAULT_IGNORE_SUFFIXES: &[&str] = &[".gtpl", ".j2", ".tmpl", ".tpl"];

/// Text a missing key expands to in the basic dialect
pub const NO_VALUE: &str = "<no value>";

const INLINE_NAME: &str = "<inline>";

/// Expands macros in strings and file sets against a context
pub trait TemplateEngine: Send + Sync {
    /// Parses, binds and renders a single string
    ///
    /// # Errors
    /// `TemplateParse` for malformed input, `TemplateRender` when rendering fails
    fn compile_string(&self, input: &str, context: &TemplateContext) -> Result<String>;

    /// Renders every file of a set, passing ignored suffixes through unchanged.
    ///
    /// Files may include or import each other by literal name. Includes see
    /// the raw content of the referenced file, never its rendered output.
    fn compile_files(
        &self,
        files: &BTreeMap<String, String>,
        context: &TemplateContext,
    ) -> Result<BTreeMap<String, String>>;
}

/// minijinja-backed engine serving both dialects
#[derive(Debug, Clone)]
pub struct JinjaEngine {
    dialect: Dialect,
    ignore_suffixes: Vec<String>,
    filters: FilterRegistry,
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JinjaEngine {
    /// Engine with auto dialect detection, default ignore suffixes and built-in filters
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Auto,
            ignore_suffixes: DEFAULT_IGNORE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            filters: FilterRegistry::with_builtins(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_ignore_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a user filter
    ///
    /// # Panics
    /// Panics if the name is already taken
    pub fn with_filter<F: TemplateFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.register(filter);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn ignore_suffixes(&self) -> &[String] {
        &self.ignore_suffixes
    }

    /// Whether a file name ends in one of the ignore suffixes
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    fn environment(&self, dialect: Dialect, context: &TemplateContext) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        match dialect {
            Dialect::Basic => {
                env.set_undefined_behavior(UndefinedBehavior::Chainable);
                env.set_formatter(no_value_formatter);
            }
            Dialect::Rich | Dialect::Auto => {
                env.set_undefined_behavior(UndefinedBehavior::Strict);
            }
        }

        self.filters.register_all(&mut env);
        env.add_function("Date", date);

        // Globals rather than render context so imported macros see them too
        for (key, value) in context.iter() {
            env.add_global(key.clone(), value.to_value());
        }
        env
    }
}

impl TemplateEngine for JinjaEngine {
    fn compile_string(&self, input: &str, context: &TemplateContext) -> Result<String> {
        let dialect = self.dialect.resolve(input);
        let source = dialect::normalize(input);
        let env = self.environment(dialect, context);

        env.render_str(&source, ())
            .map_err(|e| TemplateError::from_minijinja(INLINE_NAME, e))
    }

    fn compile_files(
        &self,
        files: &BTreeMap<String, String>,
        context: &TemplateContext,
    ) -> Result<BTreeMap<String, String>> {
        includes::check(files, |name| self.is_ignored(name))?;

        let sources: Arc<BTreeMap<String, String>> = Arc::new(
            files
                .iter()
                .map(|(name, content)| (name.clone(), dialect::normalize(content)))
                .collect(),
        );

        let mut basic: Option<Environment<'static>> = None;
        let mut rich: Option<Environment<'static>> = None;
        let mut compiled = BTreeMap::new();

        for (name, content) in files {
            if self.is_ignored(name) {
                compiled.insert(name.clone(), content.clone());
                continue;
            }

            let dialect = self.dialect.resolve(content);
            let slot = match dialect {
                Dialect::Basic => &mut basic,
                Dialect::Rich | Dialect::Auto => &mut rich,
            };
            let env = slot.get_or_insert_with(|| {
                let mut env = self.environment(dialect, context);
                let sources = Arc::clone(&sources);
                env.set_loader(move |name| Ok(sources.get(name).cloned()));
                env
            });

            let rendered = env
                .get_template(name)
                .and_then(|template| template.render(()))
                .map_err(|e| TemplateError::from_minijinja(name, e))?;

            debug!(file = %name, %dialect, bytes = rendered.len(), "Compiled asset");
            compiled.insert(name.clone(), rendered);
        }

        Ok(compiled)
    }
}

fn no_value_formatter(out: &mut Output<'_>, state: &State<'_, '_>, value: &Value) -> std::result::Result<(), Error> {
    if value.is_undefined() {
        out.write_str(NO_VALUE)?;
        return Ok(());
    }
    minijinja::escape_formatter(out, state, value)
}

fn date(value: Value) -> std::result::Result<String, Error> {
    let input = value.to_string();
    time::to_date(&input).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("Date: '{}' is not an RFC3339 timestamp: {}", input, e),
        )
    })
}
