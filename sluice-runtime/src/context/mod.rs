//! Run context composition
//!
//! Builds the env and file maps of a run from four layers applied in order.
//! Each layer may reference the layers before it, never the ones after:
//!
//! 1. project: `GLOBAL__<key>` plus the `proj` and `secret` namespaces
//! 2. instance: env data bound at registration, plus the `inst` namespace
//! 3. task: task config, each value compiled against layers 1 and 2
//! 4. hook: hook config, compiled against layers 1 and 2 plus the task
//!    values as `TASK__<key>` and the `task` namespace
//!
//! Assets are job-wide and only see layers 1 and 2.

mod env;

pub use env::EnvMap;

use serde::Serialize;
use sluice_core::domain::{ConfigEntry, InstanceSpec, JobSpec, ProjectSpec, RunType};
use sluice_core::domain::job::find_duplicate;
use sluice_template::dialect::references_secret;
use sluice_template::{TemplateContext, TemplateEngine};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Layer, Result, RuntimeError};
use crate::keys;

/// Everything a run needs to execute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// Plain env values
    pub env: EnvMap,
    /// Env values compiled from configs that reference `secret.*`
    pub secret_env: EnvMap,
    /// Compiled asset and instance files, by name
    pub files: BTreeMap<String, String>,
}

/// Composes run contexts for one project
pub struct ContextManager {
    project: ProjectSpec,
    engine: Arc<dyn TemplateEngine>,
}

impl ContextManager {
    pub fn new(project: ProjectSpec, engine: Arc<dyn TemplateEngine>) -> Self {
        Self { project, engine }
    }

    pub fn project(&self) -> &ProjectSpec {
        &self.project
    }

    /// Generates the run context of an instance
    ///
    /// # Arguments
    /// * `instance` - Registered instance, carries the job snapshot and run data
    /// * `run_type` - Task or hook
    /// * `run_name` - Hook name for hook runs, ignored for task runs
    /// * `cancel` - Checked between layers
    ///
    /// # Errors
    /// - `UnknownHook` when the hook is not attached to the job
    /// - `ContextCollision` on duplicate keys within a layer or a redefined reserved key
    /// - `Template` wrapping the failing layer and key
    /// - `Cancelled` when the token fires
    pub fn generate(
        &self,
        instance: &InstanceSpec,
        run_type: RunType,
        run_name: &str,
        cancel: &CancellationToken,
    ) -> Result<RunContext> {
        let job = &instance.job;
        check_cancelled(cancel)?;

        let mut context = self.project_layer();
        let instance_env = instance_layer(instance, &mut context)?;
        check_cancelled(cancel)?;

        let (task_env, task_secrets) = self.compile_configs(Layer::Task, &job.task.config, &context)?;
        check_cancelled(cancel)?;

        let (env, secret_env) = match run_type {
            RunType::Task => task_result(task_env, task_secrets, &instance_env),
            RunType::Hook => {
                let hook = job.hook(run_name)?;
                let hook_context = hook_layer(&context, &task_env, &task_secrets);
                let (hook_env, hook_secrets) =
                    self.compile_configs(Layer::Hook, &hook.config, &hook_context)?;
                check_cancelled(cancel)?;

                let mut env = task_env.prefixed(keys::TASK_PREFIX);
                env.extend(hook_env.iter());
                let mut secret_env = task_secrets.prefixed(keys::TASK_PREFIX);
                secret_env.extend(hook_secrets.iter());
                (env, secret_env)
            }
        };

        let files = self.compile_files(instance, job, &context)?;

        info!(
            job = %job.name,
            scheduled_at = %instance.scheduled_at,
            %run_type,
            run_name,
            env = env.len(),
            secrets = secret_env.len(),
            files = files.len(),
            "Generated run context"
        );

        Ok(RunContext {
            env,
            secret_env,
            files,
        })
    }

    fn project_layer(&self) -> TemplateContext {
        let config = self.project.effective_config();
        let mut context = TemplateContext::new();
        context.extend_strings(
            config
                .iter()
                .map(|(key, value)| (format!("{}{}", keys::GLOBAL_PREFIX, key), value.clone())),
        );
        context.insert(keys::PROJECT_NAMESPACE, config);
        context.insert(keys::SECRET_NAMESPACE, self.project.secret_strings());
        context
    }

    /// Compiles config entries, splitting those that reference secrets
    fn compile_configs(
        &self,
        layer: Layer,
        entries: &[ConfigEntry],
        context: &TemplateContext,
    ) -> Result<(EnvMap, EnvMap)> {
        if let Some(key) = find_duplicate(entries) {
            return Err(RuntimeError::ContextCollision {
                key: key.to_string(),
                layer,
            });
        }

        let mut plain = EnvMap::new();
        let mut secrets = EnvMap::new();
        for entry in entries {
            if keys::is_reserved(&entry.name) {
                return Err(RuntimeError::ContextCollision {
                    key: entry.name.clone(),
                    layer,
                });
            }

            let value = self
                .engine
                .compile_string(&entry.value, context)
                .map_err(|e| RuntimeError::template(layer, &entry.name, e))?;
            debug!(%layer, key = %entry.name, "Compiled config");

            if references_secret(&entry.value) {
                secrets.insert(entry.name.clone(), value);
            } else {
                plain.insert(entry.name.clone(), value);
            }
        }
        Ok((plain, secrets))
    }

    fn compile_files(
        &self,
        instance: &InstanceSpec,
        job: &JobSpec,
        context: &TemplateContext,
    ) -> Result<BTreeMap<String, String>> {
        let mut files: BTreeMap<String, String> = instance
            .file_data()
            .map(|d| (d.name.clone(), d.value.clone()))
            .collect();
        files.extend(job.assets.iter().map(|(k, v)| (k.clone(), v.clone())));

        self.engine
            .compile_files(&files, context)
            .map_err(|e| RuntimeError::template(Layer::Assets, e.name().to_string(), e))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RuntimeError::Cancelled);
    }
    Ok(())
}

/// Adds instance env data to the context, unprefixed
fn instance_layer(instance: &InstanceSpec, context: &mut TemplateContext) -> Result<EnvMap> {
    let mut seen = HashSet::new();
    let mut env = EnvMap::new();
    for data in instance.env_data() {
        if !seen.insert(data.name.as_str()) {
            return Err(RuntimeError::ContextCollision {
                key: data.name.clone(),
                layer: Layer::Instance,
            });
        }
        env.insert(data.name.clone(), data.value.clone());
    }

    context.extend_strings(env.iter());
    context.insert(keys::INSTANCE_NAMESPACE, to_btree(&env));
    Ok(env)
}

/// Project and instance layers plus the task values, prefixed and namespaced
fn hook_layer(base: &TemplateContext, task_env: &EnvMap, task_secrets: &EnvMap) -> TemplateContext {
    let mut merged = task_env.clone();
    merged.extend(task_secrets.iter());

    let mut context = base.clone();
    context.extend_strings(merged.prefixed(keys::TASK_PREFIX).iter());
    context.insert(keys::TASK_NAMESPACE, to_btree(&merged));
    context
}

/// Task values with the instance env on top
fn task_result(mut env: EnvMap, mut secrets: EnvMap, instance_env: &EnvMap) -> (EnvMap, EnvMap) {
    for (key, value) in instance_env.iter() {
        secrets.remove(key);
        env.insert(key, value);
    }
    (env, secrets)
}

fn to_btree(env: &EnvMap) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
