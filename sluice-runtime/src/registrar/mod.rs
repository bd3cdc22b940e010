//! Run registration
//!
//! Registering a run binds the four canonical values of an instance and
//! persists it:
//! - task runs clear any prior instance at the same scheduled instant
//! - hook runs reuse an existing instance untouched

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use chrono::{DateTime, Utc};
use sluice_core::domain::{InstanceData, InstanceSpec, JobSpec, RunType};
use sluice_core::time::format_rfc3339;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::destination::{DestinationResolver, DestinationResolvers};
use crate::error::{Result, RuntimeError};
use crate::keys;
use crate::store::InstanceStore;

/// Registers runs against an injected instance store
pub struct RunRegistrar {
    store: Arc<dyn InstanceStore>,
    resolvers: DestinationResolvers,
    clock: Arc<dyn Clock>,
}

impl RunRegistrar {
    /// Creates a registrar using the wall clock
    ///
    /// # Errors
    /// `RuntimeError::NonAtomicStore` if the store cannot register atomically
    pub fn new(store: Arc<dyn InstanceStore>, resolvers: DestinationResolvers) -> Result<Self> {
        if !store.is_atomic() {
            return Err(RuntimeError::NonAtomicStore);
        }
        Ok(Self {
            store,
            resolvers,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used for `EXECUTION_TIME`
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Registers a run of `job` scheduled at `scheduled_at`
    ///
    /// # Arguments
    /// * `job` - Validated job spec, snapshotted into the instance
    /// * `scheduled_at` - Scheduled instant, part of the instance key
    /// * `run_type` - Task runs replace prior state, hook runs keep it
    /// * `cancel` - Aborts the store operation
    ///
    /// # Returns
    /// The stored instance: fresh for tasks, possibly pre-existing for hooks
    pub async fn register(
        &self,
        job: &JobSpec,
        scheduled_at: DateTime<Utc>,
        run_type: RunType,
        cancel: &CancellationToken,
    ) -> Result<InstanceSpec> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        debug!(job = %job.name, %scheduled_at, %run_type, "Registering run");

        let stored = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = self.bind(job, scheduled_at, run_type) => result?,
        };

        info!(
            job = %job.name,
            %scheduled_at,
            %run_type,
            instance_id = %stored.id,
            "Registered run"
        );
        Ok(stored)
    }

    /// Hook runs look up the stored instance before resolving anything, so a
    /// hook never fails on a destination the task already bound.
    async fn bind(&self, job: &JobSpec, scheduled_at: DateTime<Utc>, run_type: RunType) -> Result<InstanceSpec> {
        if matches!(run_type, RunType::Hook) {
            let existing = self
                .store
                .get_by_scheduled_at(&job.name, scheduled_at)
                .await
                .map_err(|e| RuntimeError::store(&job.name, scheduled_at, e))?;
            if let Some(existing) = existing {
                debug!(job = %job.name, %scheduled_at, instance_id = %existing.id, "Reusing instance");
                return Ok(existing);
            }
        }

        let resolver = self.resolvers.for_task(&job.task.name)?;
        let data = canonical_data(job, scheduled_at, self.clock.now(), resolver.as_ref())?;
        let instance = InstanceSpec::accepted(job.clone(), scheduled_at, data);

        let stored = match run_type {
            RunType::Task => self.store.replace(instance).await,
            RunType::Hook => self.store.get_or_insert(instance).await,
        };
        stored.map_err(|e| RuntimeError::store(&job.name, scheduled_at, e))
    }
}

/// Binds `EXECUTION_TIME`, `DSTART`, `DEND` and `JOB_DESTINATION` for a run
pub fn canonical_data(
    job: &JobSpec,
    scheduled_at: DateTime<Utc>,
    execution_time: DateTime<Utc>,
    resolver: &dyn DestinationResolver,
) -> Result<Vec<InstanceData>> {
    job.task.window.validate()?;
    let (dstart, dend) = job.task.window.range(scheduled_at)?;
    let destination = resolver.resolve(&job.task.config, &job.assets)?;

    Ok(vec![
        InstanceData::env(keys::EXECUTION_TIME, format_rfc3339(execution_time)),
        InstanceData::env(keys::DSTART, format_rfc3339(dstart)),
        InstanceData::env(keys::DEND, format_rfc3339(dend)),
        InstanceData::env(keys::JOB_DESTINATION, destination.urn),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{StaticDestinationResolver, TableDestinationResolver};
    use crate::store::{InMemoryInstanceStore, StoreResult};
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};
    use sluice_core::domain::{RunState, Task};
    use sluice_core::{TaskWindow, Truncation};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 11, 0, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 11, 0, 5, 0).unwrap()
    }

    fn job() -> JobSpec {
        let window = TaskWindow::new(TimeDelta::hours(1), TimeDelta::zero(), Truncation::Hour);
        JobSpec::new(
            "sample_select",
            at(),
            "@hourly",
            Task::new("bq2bq", window)
                .with_config("PROJECT", "proj")
                .with_config("DATASET", "playground")
                .with_config("TABLE", "sample"),
        )
    }

    fn registrar(store: InMemoryInstanceStore) -> RunRegistrar {
        let resolvers = DestinationResolvers::new().with("bq2bq", TableDestinationResolver::new("bigquery"));
        RunRegistrar::new(Arc::new(store), resolvers)
            .unwrap()
            .with_clock(FixedClock(now()))
    }

    #[tokio::test]
    async fn test_register_binds_canonical_values() {
        let registrar = registrar(InMemoryInstanceStore::new());
        let instance = registrar
            .register(&job(), at(), RunType::Task, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(instance.state, RunState::Accepted);
        assert_eq!(instance.data.len(), 4);
        assert_eq!(instance.env_value("EXECUTION_TIME"), Some("2020-11-11T00:05:00Z"));
        assert_eq!(instance.env_value("DSTART"), Some("2020-11-10T23:00:00Z"));
        assert_eq!(instance.env_value("DEND"), Some("2020-11-11T00:00:00Z"));
        assert_eq!(instance.env_value("JOB_DESTINATION"), Some("bigquery://proj:playground.sample"));
    }

    #[tokio::test]
    async fn test_task_reregistration_replaces() {
        let store = InMemoryInstanceStore::new();
        let registrar = registrar(store.clone());
        let cancel = CancellationToken::new();

        let first = registrar.register(&job(), at(), RunType::Task, &cancel).await.unwrap();
        let second = registrar.register(&job(), at(), RunType::Task, &cancel).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.state, RunState::Accepted);
        let stored = store.get_by_scheduled_at("sample_select", at()).await.unwrap().unwrap();
        assert_eq!(stored.id, second.id);
    }

    #[tokio::test]
    async fn test_hook_reregistration_keeps_existing() {
        let store = InMemoryInstanceStore::new();
        let cancel = CancellationToken::new();

        let first = registrar(store.clone())
            .register(&job(), at(), RunType::Hook, &cancel)
            .await
            .unwrap();

        let later = Utc.with_ymd_and_hms(2020, 11, 11, 1, 0, 0).unwrap();
        let second = registrar(store.clone())
            .with_clock(FixedClock(later))
            .register(&job(), at(), RunType::Hook, &cancel)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.env_value("EXECUTION_TIME"), Some("2020-11-11T00:05:00Z"));
    }

    #[tokio::test]
    async fn test_invalid_destination_is_returned() {
        let mut spec = job();
        spec.task.config.clear();
        let err = registrar(InMemoryInstanceStore::new())
            .register(&spec, at(), RunType::Task, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidDestination");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = InMemoryInstanceStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = registrar(store.clone())
            .register(&job(), at(), RunType::Task, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_hook_reuses_instance_without_resolving() {
        let store = InMemoryInstanceStore::new();
        let cancel = CancellationToken::new();
        let task = registrar(store.clone())
            .register(&job(), at(), RunType::Task, &cancel)
            .await
            .unwrap();

        let unresolvable = RunRegistrar::new(Arc::new(store.clone()), DestinationResolvers::new()).unwrap();
        let mut spec = job();
        spec.task.config.clear();
        let hook = unresolvable
            .register(&spec, at(), RunType::Hook, &cancel)
            .await
            .unwrap();
        assert_eq!(hook.id, task.id);

        let other = Utc.with_ymd_and_hms(2020, 11, 12, 0, 0, 0).unwrap();
        let err = unresolvable
            .register(&spec, other, RunType::Hook, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidDestination");
        assert_eq!(store.len().unwrap(), 1);
    }

    struct NonAtomicStore;

    #[async_trait]
    impl InstanceStore for NonAtomicStore {
        fn is_atomic(&self) -> bool {
            false
        }

        async fn get_by_scheduled_at(&self, _: &str, _: DateTime<Utc>) -> StoreResult<Option<InstanceSpec>> {
            Ok(None)
        }

        async fn clear(&self, _: &str, _: DateTime<Utc>) -> StoreResult<()> {
            Ok(())
        }

        async fn save(&self, _: &InstanceSpec) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_non_atomic_store_rejected() {
        let resolvers = DestinationResolvers::new().with_fallback(StaticDestinationResolver::new("x://y", "table"));
        let err = RunRegistrar::new(Arc::new(NonAtomicStore), resolvers).err().unwrap();
        assert_eq!(err.kind(), "NonAtomicStore");
    }

    #[test]
    fn test_invalid_run_type() {
        let err: RuntimeError = "backfill".parse::<RunType>().unwrap_err().into();
        assert_eq!(err.kind(), "InvalidRunType");
    }
}
