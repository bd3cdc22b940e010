//! Destination resolution
//!
//! A resolver turns a task's config and the job's assets into the canonical
//! URN of the location the job writes to. Resolvers are built by the caller
//! and looked up by task name; nothing is registered process-wide.

mod datastore;

pub use datastore::{DatasetDestinationResolver, StaticDestinationResolver, TableDestinationResolver};

use sluice_core::domain::ConfigEntry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RuntimeError};

/// Resolved destination of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// e.g. `bigquery://project:dataset.table`
    pub urn: String,
    /// e.g. `table` or `dataset`
    pub type_tag: String,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.urn)
    }
}

/// Pure function from task config and assets to a destination
pub trait DestinationResolver: Send + Sync {
    /// Resolves the destination
    ///
    /// # Errors
    /// `RuntimeError::InvalidDestination` when required config keys are absent
    fn resolve(&self, config: &[ConfigEntry], assets: &BTreeMap<String, String>) -> Result<Destination>;
}

/// Resolvers keyed by task name, with an optional fallback
#[derive(Clone, Default)]
pub struct DestinationResolvers {
    by_task: HashMap<String, Arc<dyn DestinationResolver>>,
    fallback: Option<Arc<dyn DestinationResolver>>,
}

impl DestinationResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the resolver for a task
    ///
    /// # Panics
    /// Panics if the task already has a resolver
    pub fn register<R: DestinationResolver + 'static>(&mut self, task: impl Into<String>, resolver: R) {
        let task = task.into();
        if self.by_task.contains_key(&task) {
            panic!("Destination resolver for task '{}' is already registered", task);
        }
        self.by_task.insert(task, Arc::new(resolver));
    }

    /// Builder-style register
    pub fn with<R: DestinationResolver + 'static>(mut self, task: impl Into<String>, resolver: R) -> Self {
        self.register(task, resolver);
        self
    }

    /// Resolver used for tasks without their own
    pub fn with_fallback<R: DestinationResolver + 'static>(mut self, resolver: R) -> Self {
        self.fallback = Some(Arc::new(resolver));
        self
    }

    /// Looks up the resolver of a task
    pub fn for_task(&self, task: &str) -> Result<Arc<dyn DestinationResolver>> {
        self.by_task
            .get(task)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| {
                RuntimeError::InvalidDestination(format!("no destination resolver for task '{}'", task))
            })
    }
}

impl fmt::Debug for DestinationResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tasks: Vec<&String> = self.by_task.keys().collect();
        tasks.sort();
        f.debug_struct("DestinationResolvers")
            .field("tasks", &tasks)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Value of a config entry
pub(crate) fn config_value<'a>(config: &'a [ConfigEntry], name: &str) -> Option<&'a str> {
    config
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_task() {
        let resolvers = DestinationResolvers::new()
            .with("bq2bq", TableDestinationResolver::new("bigquery"))
            .with_fallback(StaticDestinationResolver::new("file://out", "file"));

        let config = vec![
            ConfigEntry::new("PROJECT", "proj"),
            ConfigEntry::new("DATASET", "data"),
            ConfigEntry::new("TABLE", "sample"),
        ];
        let assets = BTreeMap::new();

        let dest = resolvers.for_task("bq2bq").unwrap().resolve(&config, &assets).unwrap();
        assert_eq!(dest.urn, "bigquery://proj:data.sample");

        let dest = resolvers.for_task("python").unwrap().resolve(&config, &assets).unwrap();
        assert_eq!(dest.urn, "file://out");
    }

    #[test]
    fn test_missing_resolver() {
        let resolvers = DestinationResolvers::new();
        let err = resolvers.for_task("bq2bq").err().unwrap();
        assert_eq!(err.kind(), "InvalidDestination");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut resolvers = DestinationResolvers::new();
        resolvers.register("bq2bq", TableDestinationResolver::new("bigquery"));
        resolvers.register("bq2bq", DatasetDestinationResolver::new("bigquery"));
    }

    #[test]
    fn test_config_value_ignores_blank() {
        let config = vec![ConfigEntry::new("PROJECT", "  "), ConfigEntry::new("TABLE", " t ")];
        assert_eq!(config_value(&config, "PROJECT"), None);
        assert_eq!(config_value(&config, "TABLE"), Some("t"));
    }
}
