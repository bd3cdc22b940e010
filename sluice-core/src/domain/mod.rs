//! Core domain types
//!
//! This module contains the specifications the control plane works with.
//! Jobs and projects are produced by spec loaders; instances are produced by
//! the run registrar and consumed by the context manager.

pub mod instance;
pub mod job;
pub mod project;

pub use instance::{DataType, InstanceData, InstanceSpec, RunState, RunType};
pub use job::{
    Behavior, ConfigEntry, Dependency, DependencyType, Hook, HttpDependency, JobMetadata, JobSpec,
    Notifier, ResourceConfig, Retry, Schedule, Task,
};
pub use project::{NamespaceSpec, ProjectSpec};
