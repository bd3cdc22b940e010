//! Template context values
//!
//! The context mixes plain strings, lists, nested maps (for dotted namespaces
//! such as `secret.NAME`) and callables.

use minijinja::value::{Rest, Value};
use minijinja::{Error, ErrorKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable exposed to templates, receives its arguments rendered as strings
pub type TemplateFn = Arc<dyn Fn(&[String]) -> std::result::Result<String, String> + Send + Sync>;

/// A single value in the template context
#[derive(Clone)]
pub enum ContextValue {
    String(String),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
    Func(TemplateFn),
}

impl ContextValue {
    /// Wraps a closure as a callable value
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[String]) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        ContextValue::Func(Arc::new(f))
    }

    /// Returns the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            ContextValue::String(s) => Value::from(s.clone()),
            ContextValue::List(items) => {
                Value::from(items.iter().map(ContextValue::to_value).collect::<Vec<_>>())
            }
            ContextValue::Map(entries) => Value::from(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<BTreeMap<String, Value>>(),
            ),
            ContextValue::Func(f) => {
                let f = Arc::clone(f);
                Value::from_function(move |args: Rest<String>| -> Result<String, Error> {
                    let args: &[String] = &args;
                    f(args).map_err(|msg| Error::new(ErrorKind::InvalidOperation, msg))
                })
            }
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::String(s) => write!(f, "{:?}", s),
            ContextValue::List(items) => f.debug_list().entries(items).finish(),
            ContextValue::Map(entries) => f.debug_map().entries(entries).finish(),
            ContextValue::Func(_) => write!(f, "<func>"),
        }
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::String(s)
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::String(s.to_string())
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(items: Vec<String>) -> Self {
        ContextValue::List(items.into_iter().map(ContextValue::String).collect())
    }
}

impl From<BTreeMap<String, String>> for ContextValue {
    fn from(entries: BTreeMap<String, String>) -> Self {
        ContextValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, ContextValue::String(v)))
                .collect(),
        )
    }
}

/// Frozen mapping used to expand templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: BTreeMap<String, ContextValue>,
}

impl TemplateContext {
    /// Creates an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Option<ContextValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts every string pair, later pairs win
    pub fn extend_strings<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in entries {
            self.values.insert(k.into(), ContextValue::String(v.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// String value of a key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ContextValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = TemplateContext::new();
        context.extend_strings(iter);
        context
    }
}
