//! Project domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project specification
///
/// Created outside the control plane and never mutated during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Secret name to opaque value
    #[serde(default)]
    pub secrets: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub namespace: Option<NamespaceSpec>,
}

/// Namespace inside a project, its config overrides project config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl ProjectSpec {
    /// Creates a project with the given config and no secrets
    pub fn new(name: impl Into<String>, config: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            config,
            secrets: BTreeMap::new(),
            namespace: None,
        }
    }

    /// Adds a secret
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Attaches a namespace
    pub fn with_namespace(mut self, namespace: NamespaceSpec) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Project config with the namespace overlay applied
    pub fn effective_config(&self) -> BTreeMap<String, String> {
        let mut config = self.config.clone();
        if let Some(namespace) = &self.namespace {
            config.extend(
                namespace
                    .config
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        config
    }

    /// Secrets decoded as text, invalid UTF-8 is replaced
    pub fn secret_strings(&self) -> BTreeMap<String, String> {
        self.secrets
            .iter()
            .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect()
    }
}
