//! Asset preview without registering a run

use chrono::{DateTime, Utc};
use sluice_core::domain::JobSpec;
use sluice_template::{TemplateContext, TemplateEngine};
use std::collections::BTreeMap;
use tracing::debug;

use crate::destination::DestinationResolver;
use crate::error::{Layer, Result, RuntimeError};
use crate::registrar::canonical_data;

/// Compiles the assets of a job against the four canonical keys only
///
/// `EXECUTION_TIME` is the scheduled instant itself, so the output is a pure
/// function of the inputs.
pub fn dump_assets(
    job: &JobSpec,
    scheduled_at: DateTime<Utc>,
    engine: &dyn TemplateEngine,
    resolver: &dyn DestinationResolver,
) -> Result<BTreeMap<String, String>> {
    let context: TemplateContext = canonical_data(job, scheduled_at, scheduled_at, resolver)?
        .into_iter()
        .map(|data| (data.name, data.value))
        .collect();

    debug!(job = %job.name, %scheduled_at, assets = job.assets.len(), "Dumping assets");
    engine
        .compile_files(&job.assets, &context)
        .map_err(|e| RuntimeError::template(Layer::Assets, e.name().to_string(), e))
}
