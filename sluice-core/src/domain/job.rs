//! Job domain types

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use crate::error::{CoreError, Result};
use crate::window::{Window, duration_str};

static JOB_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{2,219}$").expect("job name pattern is valid")
});

/// Job specification
///
/// Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub behavior: Behavior,
    pub task: Task,
    /// Filename to raw content
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    #[serde(default)]
    pub hooks: Vec<Hook>,
    /// Upstream job name to dependency
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: JobMetadata,
}

/// Schedule of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// 5-field cron or a shortcut such as `@daily`
    pub interval: String,
}

/// Run behavior of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    #[serde(default)]
    pub depends_on_past: bool,
    #[serde(default)]
    pub catchup: bool,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub notify: Vec<Notifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retry {
    #[serde(default)]
    pub count: u32,
    #[serde(with = "duration_str", default)]
    pub delay: TimeDelta,
    #[serde(default)]
    pub exponential_backoff: bool,
}

/// Notification rule, e.g. `on: failure` to a list of channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifier {
    pub on: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Single named config value
///
/// Configs are kept as ordered lists because the emitted env file follows
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Main transformation of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub config: Vec<ConfigEntry>,
    /// Must match the version of the owning job
    #[serde(default)]
    pub window: Window,
}

/// Named pre/post step attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    #[serde(default)]
    pub config: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Job in the same project
    Intra,
    /// Job in another project
    Inter,
    /// Resource outside the platform, reached over HTTP
    Extra,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub http: Option<HttpDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDependency {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub resource: Option<ResourceConfig>,
    /// Scheduler specific settings such as pool or queue
    #[serde(default)]
    pub scheduler: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub cpu_request: Option<String>,
    #[serde(default)]
    pub memory_request: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, window: impl Into<Window>) -> Self {
        Self {
            name: name.into(),
            config: Vec::new(),
            window: window.into(),
        }
    }

    /// Appends a config entry
    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push(ConfigEntry::new(name, value));
        self
    }
}

impl Hook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Vec::new(),
        }
    }

    /// Appends a config entry
    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push(ConfigEntry::new(name, value));
        self
    }
}

impl JobSpec {
    /// Creates a version 1 job with default behavior and no assets, hooks or dependencies
    pub fn new(
        name: impl Into<String>,
        start_date: DateTime<Utc>,
        interval: impl Into<String>,
        task: Task,
    ) -> Self {
        Self {
            name: name.into(),
            version: 1,
            owner: String::new(),
            description: String::new(),
            schedule: Schedule {
                start_date,
                end_date: None,
                interval: interval.into(),
            },
            behavior: Behavior::default(),
            task,
            assets: BTreeMap::new(),
            hooks: Vec::new(),
            dependencies: BTreeMap::new(),
            labels: BTreeMap::new(),
            metadata: JobMetadata::default(),
        }
    }

    pub fn with_asset(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.assets.insert(name.into(), content.into());
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Looks up a hook by name
    pub fn hook(&self, name: &str) -> Result<&Hook> {
        self.hooks
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| CoreError::UnknownHook {
                job: self.name.clone(),
                hook: name.to_string(),
            })
    }

    /// Validates the job spec
    ///
    /// # Errors
    /// Returns `CoreError::InvalidJobSpec` describing the first violation found,
    /// or `CoreError::InvalidWindow` for an invalid task window.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(CoreError::invalid_job(&self.name, reason));

        if !JOB_NAME.is_match(&self.name) {
            return fail(format!(
                "name must match {} (3 to 220 characters)",
                JOB_NAME.as_str()
            ));
        }
        if !matches!(self.version, 1 | 2) {
            return fail(format!("unsupported version {}, expected 1 or 2", self.version));
        }
        if self.schedule.interval.trim().is_empty() {
            return fail("schedule interval cannot be empty".to_string());
        }
        if let Some(end) = self.schedule.end_date {
            if end < self.schedule.start_date {
                return fail("schedule end_date is before start_date".to_string());
            }
        }

        if self.task.name.trim().is_empty() {
            return fail("task name cannot be empty".to_string());
        }
        if self.task.window.version() != self.version {
            return fail(format!(
                "task window follows version {} rules but the job is version {}",
                self.task.window.version(),
                self.version
            ));
        }
        self.task.window.validate()?;
        if let Some(reason) = check_config(&self.task.config) {
            return fail(format!("task config: {}", reason));
        }

        let mut hook_names = HashSet::new();
        for hook in &self.hooks {
            if hook.name.trim().is_empty() {
                return fail("hook name cannot be empty".to_string());
            }
            if !hook_names.insert(hook.name.as_str()) {
                return fail(format!("hook '{}' is defined more than once", hook.name));
            }
            if let Some(reason) = check_config(&hook.config) {
                return fail(format!("hook '{}' config: {}", hook.name, reason));
            }
        }

        if self.assets.keys().any(|name| name.trim().is_empty()) {
            return fail("asset file names cannot be empty".to_string());
        }

        for (name, dependency) in &self.dependencies {
            if name.trim().is_empty() {
                return fail("dependency name cannot be empty".to_string());
            }
            match (dependency.dependency_type, &dependency.http) {
                (DependencyType::Extra, None) => {
                    return fail(format!("extra dependency '{}' needs an http target", name));
                }
                (DependencyType::Intra | DependencyType::Inter, Some(_)) => {
                    return fail(format!(
                        "dependency '{}' only extra dependencies may carry an http target",
                        name
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Returns the first name that appears more than once
pub fn find_duplicate(entries: &[ConfigEntry]) -> Option<&str> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .find(|e| !seen.insert(e.name.as_str()))
        .map(|e| e.name.as_str())
}

fn check_config(entries: &[ConfigEntry]) -> Option<String> {
    if entries.iter().any(|e| e.name.trim().is_empty()) {
        return Some("config names cannot be empty".to_string());
    }
    find_duplicate(entries).map(|name| format!("'{}' is defined more than once", name))
}
