//! Instance domain types
//!
//! An instance records one scheduled occurrence of a job, keyed by
//! `(job name, scheduled_at)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::job::JobSpec;
use crate::error::CoreError;

/// Which part of a job a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// The main transformation
    Task,
    /// A hook attached to the job
    Hook,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Task => write!(f, "task"),
            RunType::Hook => write!(f, "hook"),
        }
    }
}

impl FromStr for RunType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(RunType::Task),
            "hook" => Ok(RunType::Hook),
            _ => Err(CoreError::InvalidRunType(s.to_string())),
        }
    }
}

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Accepted,
    Running,
    Success,
    Failed,
}

impl RunState {
    /// Whether the state can move to `next`
    ///
    /// Registration may reset any state back to `Accepted`; that path is
    /// handled by the registrar and not checked here.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Accepted, RunState::Running)
                | (RunState::Running, RunState::Success)
                | (RunState::Running, RunState::Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Accepted => write!(f, "accepted"),
            RunState::Running => write!(f, "running"),
            RunState::Success => write!(f, "success"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Where an instance data entry ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Exposed as an environment variable
    Env,
    /// Written as a file
    File,
}

/// Single entry of the per-run data bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceData {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl InstanceData {
    pub fn env(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            data_type: DataType::Env,
        }
    }

    pub fn file(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            data_type: DataType::File,
        }
    }
}

/// Record of a specific scheduled occurrence of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub id: Uuid,
    /// Snapshot of the job at registration time
    pub job: JobSpec,
    pub scheduled_at: DateTime<Utc>,
    pub state: RunState,
    pub data: Vec<InstanceData>,
}

impl InstanceSpec {
    /// Creates a freshly accepted instance
    pub fn accepted(job: JobSpec, scheduled_at: DateTime<Utc>, data: Vec<InstanceData>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            scheduled_at,
            state: RunState::Accepted,
            data,
        }
    }

    /// Env-typed entries in declaration order
    pub fn env_data(&self) -> impl Iterator<Item = &InstanceData> {
        self.data.iter().filter(|d| d.data_type == DataType::Env)
    }

    /// File-typed entries in declaration order
    pub fn file_data(&self) -> impl Iterator<Item = &InstanceData> {
        self.data.iter().filter(|d| d.data_type == DataType::File)
    }

    /// Value of an env entry
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env_data()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_type_parse() {
        assert_eq!("task".parse::<RunType>().unwrap(), RunType::Task);
        assert_eq!("HOOK".parse::<RunType>().unwrap(), RunType::Hook);
        let err = "sensor".parse::<RunType>().unwrap_err();
        assert_eq!(err.kind(), "InvalidRunType");
    }

    #[test]
    fn test_state_transitions() {
        assert!(RunState::Accepted.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Failed));
        assert!(!RunState::Accepted.can_transition_to(RunState::Success));
        assert!(!RunState::Success.can_transition_to(RunState::Running));
    }

    #[test]
    fn test_data_type_serde() {
        let data = InstanceData::file("query.sql", "select 1");
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"type\":\"file\""));
    }
}
