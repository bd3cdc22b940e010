//! Error types for core domain validation

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating specs or parsing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Window has an unsupported truncation or a non-positive size
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Job spec failed validation
    #[error("invalid job spec '{job}': {reason}")]
    InvalidJobSpec {
        /// Name of the offending job
        job: String,
        /// Human readable reason
        reason: String,
    },

    /// Run type was neither `task` nor `hook`
    #[error("invalid run type '{0}', expected one of: task, hook")]
    InvalidRunType(String),

    /// Hook name is not attached to the job
    #[error("hook '{hook}' not found in job '{job}'")]
    UnknownHook {
        /// Job that was searched
        job: String,
        /// Requested hook name
        hook: String,
    },
}

impl CoreError {
    /// Create a job spec validation error
    pub fn invalid_job(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidJobSpec {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Stable string identifier of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindow(_) => "InvalidWindow",
            Self::InvalidJobSpec { .. } => "InvalidJobSpec",
            Self::InvalidRunType(_) => "InvalidRunType",
            Self::UnknownHook { .. } => "UnknownHook",
        }
    }
}
