//! Template filters
//!
//! Filters transform the value on their left, `{{ DSTART | ToDate }}`.
//! Every filter is also registered as a function of the same name so the
//! call form `{{ ToDate(DSTART) }}` works in both dialects.

use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error, ErrorKind};
use sluice_core::time;
use std::sync::Arc;

/// Trait for template filters.
///
/// A filter receives the rendered input and any extra arguments as strings and
/// returns the replacement text. Failures surface as `FilterError`.
pub trait TemplateFilter: Send + Sync {
    /// Name used in templates
    fn name(&self) -> &'static str;

    /// Applies the filter
    ///
    /// # Arguments
    /// * `input` - Value on the left of the pipe
    /// * `args` - Extra arguments, e.g. `{{ X | Pad(4) }}`
    ///
    /// # Errors
    /// Returns a human readable message if the input cannot be transformed
    fn apply(&self, input: &str, args: &[String]) -> Result<String, String>;

    fn description(&self) -> &'static str {
        ""
    }
}

/// Formats an RFC3339 timestamp as `YYYY-MM-DD`
pub struct ToDateFilter;

impl TemplateFilter for ToDateFilter {
    fn name(&self) -> &'static str {
        "ToDate"
    }

    fn apply(&self, input: &str, _args: &[String]) -> Result<String, String> {
        time::to_date(input).map_err(|e| format!("'{}' is not an RFC3339 timestamp: {}", input, e))
    }

    fn description(&self) -> &'static str {
        "Formats an RFC3339 timestamp as YYYY-MM-DD"
    }
}

/// Registry of filters shared by every engine environment
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: Vec<Arc<dyn TemplateFilter>>,
}

impl FilterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in filters
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ToDateFilter);
        registry
    }

    /// Registers a filter
    ///
    /// # Panics
    /// Panics if a filter with the same name is already registered
    pub fn register<F: TemplateFilter + 'static>(&mut self, filter: F) {
        let name = filter.name();
        if self.get(name).is_some() {
            panic!("Filter with name '{}' is already registered", name);
        }
        self.filters.push(Arc::new(filter));
    }

    /// Looks up a filter by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TemplateFilter>> {
        self.filters.iter().find(|f| f.name() == name)
    }

    pub fn filters(&self) -> &[Arc<dyn TemplateFilter>] {
        &self.filters
    }

    /// Registers every filter, and its function form, into an environment
    pub(crate) fn register_all(&self, env: &mut Environment<'_>) {
        for filter in &self.filters {
            let as_filter = Arc::clone(filter);
            env.add_filter(
                filter.name(),
                move |value: Value, args: Rest<Value>| -> Result<String, Error> {
                    invoke(as_filter.as_ref(), &value, &args)
                },
            );

            let as_function = Arc::clone(filter);
            env.add_function(
                filter.name(),
                move |value: Value, args: Rest<Value>| -> Result<String, Error> {
                    invoke(as_function.as_ref(), &value, &args)
                },
            );
        }
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

fn invoke(filter: &dyn TemplateFilter, value: &Value, args: &[Value]) -> Result<String, Error> {
    if value.is_undefined() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("{}: input is undefined", filter.name()),
        ));
    }
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    filter
        .apply(&value.to_string(), &args)
        .map_err(|msg| Error::new(ErrorKind::InvalidOperation, format!("{}: {}", filter.name(), msg)))
}
