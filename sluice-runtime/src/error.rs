//! Error types for the run runtime

use chrono::{DateTime, Utc};
use sluice_core::CoreError;
use sluice_template::TemplateError;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Composition layer a value was compiled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Project,
    Instance,
    Task,
    Hook,
    Assets,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Project => write!(f, "project"),
            Layer::Instance => write!(f, "instance"),
            Layer::Task => write!(f, "task"),
            Layer::Hook => write!(f, "hook"),
            Layer::Assets => write!(f, "assets"),
        }
    }
}

/// Errors that can occur while registering runs or building their context
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Window has an unsupported truncation or a non-positive size
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Destination resolver is missing required config
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Job spec failed validation
    #[error("invalid job spec '{job}': {reason}")]
    InvalidJobSpec { job: String, reason: String },

    /// Template engine failure, wrapped with where it happened
    #[error("{layer} layer: failed to compile '{key}'")]
    Template {
        layer: Layer,
        key: String,
        #[source]
        source: TemplateError,
    },

    /// Hook name is not attached to the job
    #[error("hook '{hook}' not found in job '{job}'")]
    UnknownHook { job: String, hook: String },

    /// Duplicate key inside a layer, or a later layer redefining a reserved key
    #[error("{layer} layer: key '{key}' collides with an existing context key")]
    ContextCollision { key: String, layer: Layer },

    /// Store saw a concurrent registration for the same instance
    #[error("concurrent registration of job '{job}' at {scheduled_at}")]
    StoreConflict {
        job: String,
        scheduled_at: DateTime<Utc>,
    },

    /// Any other store failure
    #[error("instance store failed for job '{job}' at {scheduled_at}")]
    Store {
        job: String,
        scheduled_at: DateTime<Utc>,
        #[source]
        source: StoreError,
    },

    /// Store cannot run clear+save or get+save atomically
    #[error("instance store does not provide atomic registration")]
    NonAtomicStore,

    #[error("invalid run type '{0}', expected one of: task, hook")]
    InvalidRunType(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Wraps a template error with its layer and key
    pub fn template(layer: Layer, key: impl Into<String>, source: TemplateError) -> Self {
        Self::Template {
            layer,
            key: key.into(),
            source,
        }
    }

    /// Wraps a store error with the instance key
    pub fn store(job: impl Into<String>, scheduled_at: DateTime<Utc>, source: StoreError) -> Self {
        let job = job.into();
        match source {
            StoreError::Conflict => Self::StoreConflict { job, scheduled_at },
            source => Self::Store {
                job,
                scheduled_at,
                source,
            },
        }
    }

    /// Stable string identifier of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindow(_) => "InvalidWindow",
            Self::InvalidDestination(_) => "InvalidDestination",
            Self::InvalidJobSpec { .. } => "InvalidJobSpec",
            Self::Template { source, .. } => source.identifier(),
            Self::UnknownHook { .. } => "UnknownHook",
            Self::ContextCollision { .. } => "ContextCollision",
            Self::StoreConflict { .. } => "StoreConflict",
            Self::Store { .. } => "Store",
            Self::NonAtomicStore => "NonAtomicStore",
            Self::InvalidRunType(_) => "InvalidRunType",
            Self::Cancelled => "Cancelled",
            Self::Io(_) => "Io",
        }
    }

    /// Check if this error came from the template engine
    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CoreError> for RuntimeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidWindow(msg) => Self::InvalidWindow(msg),
            CoreError::InvalidJobSpec { job, reason } => Self::InvalidJobSpec { job, reason },
            CoreError::InvalidRunType(value) => Self::InvalidRunType(value),
            CoreError::UnknownHook { job, hook } => Self::UnknownHook { job, hook },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sluice_template::TemplateErrorKind;

    #[test]
    fn test_store_conflict_is_promoted() {
        let at = Utc.with_ymd_and_hms(2020, 11, 11, 0, 0, 0).unwrap();
        let err = RuntimeError::store("job-a", at, StoreError::Conflict);
        assert_eq!(err.kind(), "StoreConflict");

        let err = RuntimeError::store("job-a", at, StoreError::Backend("disk full".into()));
        assert_eq!(err.kind(), "Store");
        assert!(err.to_string().contains("job-a"));
    }

    #[test]
    fn test_template_kind_uses_identifier() {
        let source = TemplateError::render("<inline>", TemplateErrorKind::UnknownKey, "undefined");
        let err = RuntimeError::template(Layer::Hook, "FILTER", source);
        assert_eq!(err.kind(), "TemplateRender");
        assert!(err.is_template());
        assert_eq!(err.to_string(), "hook layer: failed to compile 'FILTER'");
    }

    #[test]
    fn test_from_core_error() {
        let err: RuntimeError = CoreError::UnknownHook {
            job: "job-a".into(),
            hook: "transporter".into(),
        }
        .into();
        assert_eq!(err.kind(), "UnknownHook");
    }
}
