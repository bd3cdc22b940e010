//! Run input command handler
//!
//! Registers a run against an in-process store, compiles its context and
//! writes the instance data the task container reads on start.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::*;
use sluice_core::domain::{ProjectSpec, RunType};
use sluice_core::time::format_rfc3339;
use sluice_runtime::{
    ContextManager, DumpReport, InMemoryInstanceStore, InstanceDataWriter, RunContext, RunRegistrar,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{DestinationArgs, TemplateArgs, load_config, parse_instant};
use crate::spec::{SpecLoader, load_project};

/// Arguments of `sluice run-input`
#[derive(Args, Debug)]
pub struct RunInputArgs {
    /// Directory holding job.yaml
    pub job_dir: PathBuf,

    /// Spec root for this.yaml defaults, defaults to the job directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Project file with config and secrets
    #[arg(long, env = "SLUICE_PROJECT_FILE", default_value = "project.yaml")]
    pub project: PathBuf,

    /// Scheduled instant (RFC 3339)
    #[arg(long)]
    pub scheduled_at: String,

    /// What to run: task or hook
    #[arg(long, default_value = "task")]
    pub run_type: RunType,

    /// Task or hook name, defaults to the job's task
    #[arg(long)]
    pub run_name: Option<String>,

    /// Directory that receives in/ [env: SLUICE_OUTPUT_DIR]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Fail when a value still contains <no value> [env: SLUICE_STRICT_UNSUBSTITUTED]
    #[arg(long)]
    pub strict: bool,

    /// Print the compiled context as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub destination: DestinationArgs,

    #[command(flatten)]
    pub template: TemplateArgs,
}

/// Handle `sluice run-input`
pub async fn handle_run_input_command(args: RunInputArgs) -> Result<()> {
    let mut config = load_config(&args.template)?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    config.strict_unsubstituted |= args.strict;

    let scheduled_at = parse_instant(&args.scheduled_at)?;
    let loader = SpecLoader::new(args.root.as_ref().unwrap_or(&args.job_dir))?;
    let job = loader.load_job(&args.job_dir)?;
    job.validate()?;

    let project = if args.project.is_file() {
        load_project(&args.project)?
    } else {
        warn!(path = %args.project.display(), "Project file not found, using an empty project");
        ProjectSpec::default()
    };

    let run_name = args.run_name.clone().unwrap_or_else(|| match args.run_type {
        RunType::Task => job.task.name.clone(),
        RunType::Hook => String::new(),
    });
    if run_name.is_empty() {
        bail!("--run-name is required for hook runs");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let registrar = RunRegistrar::new(
        Arc::new(InMemoryInstanceStore::new()),
        args.destination.resolvers(),
    )?;
    let instance = registrar
        .register(&job, scheduled_at, args.run_type, &cancel)
        .await
        .with_context(|| format!("failed to register run of job '{}'", job.name))?;

    let manager = ContextManager::new(project, Arc::new(config.engine()));
    let context = manager
        .generate(&instance, args.run_type, &run_name, &cancel)
        .with_context(|| format!("failed to compile {} '{}'", args.run_type, run_name))?;

    let writer = InstanceDataWriter::new(&config.output_dir);
    let report = writer.write(&context)?;

    info!(
        job = %job.name,
        instance = %instance.id,
        scheduled_at = %format_rfc3339(scheduled_at),
        "Run input ready"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        print_summary(&writer, &context, &report);
    }

    check_report(&report, config.strict_unsubstituted)
}

fn print_summary(writer: &InstanceDataWriter, context: &RunContext, report: &DumpReport) {
    println!(
        "{}",
        format!("✓ Wrote instance data to {}", writer.instance_dir().display()).green()
    );
    println!("  {}: {}", "Env".bold(), context.env.len());
    println!("  {}: {}", "Secrets".bold(), context.secret_env.len());
    println!("  {}: {}", "Files".bold(), context.files.len());
    for path in &report.written {
        println!("    {}", path.display().to_string().dimmed());
    }
    if report.has_unsubstituted() {
        println!(
            "{} {}",
            "⚠ Unsubstituted values:".yellow(),
            report.keys_with_unsubstituted_value.join(", ")
        );
    }
}

/// Fails in strict mode when anything still holds `<no value>`
fn check_report(report: &DumpReport, strict: bool) -> Result<()> {
    if strict && report.has_unsubstituted() {
        bail!(
            "unsubstituted values in: {}",
            report.keys_with_unsubstituted_value.join(", ")
        );
    }
    Ok(())
}
