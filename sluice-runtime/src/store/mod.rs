//! Instance store
//!
//! Registration needs two compound operations to be atomic per
//! `(job name, scheduled_at)` key:
//! - `replace`: clear any prior instance, then save the new one
//! - `get_or_insert`: return the existing instance, or save the new one
//!
//! Stores that cannot guarantee this report `is_atomic() == false` and are
//! rejected by the registrar.

mod memory;

pub use memory::InMemoryInstanceStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_core::domain::InstanceSpec;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by an instance store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another registration for the same key won the race
    #[error("instance already exists")]
    Conflict,

    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Repository trait for instance persistence
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Whether `replace` and `get_or_insert` are atomic per key
    fn is_atomic(&self) -> bool;

    /// Fetches the instance of a job at a scheduled instant
    async fn get_by_scheduled_at(
        &self,
        job: &str,
        scheduled_at: DateTime<Utc>,
    ) -> StoreResult<Option<InstanceSpec>>;

    /// Removes the instance of a job at a scheduled instant, if any
    async fn clear(&self, job: &str, scheduled_at: DateTime<Utc>) -> StoreResult<()>;

    /// Saves a new instance
    ///
    /// # Errors
    /// `StoreError::Conflict` if an instance already exists for the key
    async fn save(&self, instance: &InstanceSpec) -> StoreResult<()>;

    /// Clears any prior instance for the key and saves `instance`
    async fn replace(&self, instance: InstanceSpec) -> StoreResult<InstanceSpec> {
        self.clear(&instance.job.name, instance.scheduled_at).await?;
        self.save(&instance).await?;
        Ok(instance)
    }

    /// Returns the instance stored for the key, saving `instance` when absent
    async fn get_or_insert(&self, instance: InstanceSpec) -> StoreResult<InstanceSpec> {
        if let Some(existing) = self
            .get_by_scheduled_at(&instance.job.name, instance.scheduled_at)
            .await?
        {
            return Ok(existing);
        }
        self.save(&instance).await?;
        Ok(instance)
    }
}
