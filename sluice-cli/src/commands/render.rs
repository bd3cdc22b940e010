//! Render command handler
//!
//! Compiles the assets of a local job against the canonical run keys without
//! registering anything.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use sluice_runtime::{dump_assets, safe_relative};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{DestinationArgs, TemplateArgs, load_config, parse_instant};
use crate::spec::SpecLoader;

/// Arguments of `sluice render`
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Directory holding job.yaml
    pub job_dir: PathBuf,

    /// Spec root for this.yaml defaults, defaults to the job directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Scheduled instant (RFC 3339)
    #[arg(long)]
    pub scheduled_at: String,

    /// Write compiled assets into this directory instead of printing them
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub destination: DestinationArgs,

    #[command(flatten)]
    pub template: TemplateArgs,
}

/// Handle `sluice render`
pub fn handle_render_command(args: RenderArgs) -> Result<()> {
    let config = load_config(&args.template)?;
    let scheduled_at = parse_instant(&args.scheduled_at)?;

    let loader = SpecLoader::new(args.root.as_ref().unwrap_or(&args.job_dir))?;
    let job = loader.load_job(&args.job_dir)?;
    job.validate()?;

    let resolver = args.destination.resolvers().for_task(&job.task.name)?;
    let files = dump_assets(&job, scheduled_at, &config.engine(), resolver.as_ref())
        .with_context(|| format!("failed to render assets of job '{}'", job.name))?;

    match &args.out {
        Some(out) => {
            write_files(out, &files)?;
            info!(job = %job.name, files = files.len(), out = %out.display(), "Rendered assets");
            println!(
                "{}",
                format!("✓ Rendered {} asset(s) to {}", files.len(), out.display()).green()
            );
        }
        None => print_files(&files),
    }

    Ok(())
}

fn print_files(files: &BTreeMap<String, String>) {
    if files.is_empty() {
        println!("{}", "Job has no assets.".yellow());
        return;
    }
    for (name, content) in files {
        println!("{}", format!("── {} ", name).bold());
        println!("{}", content);
    }
}

fn write_files(out: &Path, files: &BTreeMap<String, String>) -> Result<()> {
    for name in files.keys() {
        safe_relative(name)?;
    }
    for (name, content) in files {
        let path = out.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
