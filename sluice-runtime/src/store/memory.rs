//! In-memory instance store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_core::domain::InstanceSpec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{InstanceStore, StoreError, StoreResult};

type Key = (String, DateTime<Utc>);

/// In-memory implementation of InstanceStore
///
/// Uses Arc<Mutex<HashMap>> so clones share state. Compound operations run
/// under a single lock and are atomic per key.
#[derive(Clone, Default)]
pub struct InMemoryInstanceStore {
    instances: Arc<Mutex<HashMap<Key, InstanceSpec>>>,
}

impl InMemoryInstanceStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored instances
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<Key, InstanceSpec>>> {
        self.instances
            .lock()
            .map_err(|e| StoreError::Backend(format!("instance store lock poisoned: {}", e)))
    }
}

fn key_of(instance: &InstanceSpec) -> Key {
    (instance.job.name.clone(), instance.scheduled_at)
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    fn is_atomic(&self) -> bool {
        true
    }

    async fn get_by_scheduled_at(
        &self,
        job: &str,
        scheduled_at: DateTime<Utc>,
    ) -> StoreResult<Option<InstanceSpec>> {
        Ok(self.lock()?.get(&(job.to_string(), scheduled_at)).cloned())
    }

    async fn clear(&self, job: &str, scheduled_at: DateTime<Utc>) -> StoreResult<()> {
        self.lock()?.remove(&(job.to_string(), scheduled_at));
        Ok(())
    }

    async fn save(&self, instance: &InstanceSpec) -> StoreResult<()> {
        let mut instances = self.lock()?;
        let key = key_of(instance);
        if instances.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        instances.insert(key, instance.clone());
        Ok(())
    }

    async fn replace(&self, instance: InstanceSpec) -> StoreResult<InstanceSpec> {
        self.lock()?.insert(key_of(&instance), instance.clone());
        Ok(instance)
    }

    async fn get_or_insert(&self, instance: InstanceSpec) -> StoreResult<InstanceSpec> {
        let mut instances = self.lock()?;
        let stored = instances
            .entry(key_of(&instance))
            .or_insert(instance);
        Ok(stored.clone())
    }
}
