//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod render;
mod run_input;
mod validate;
mod window;

pub use render::RenderArgs;
pub use run_input::RunInputArgs;
pub use window::WindowArgs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use sluice_runtime::{
    Config, DestinationResolvers, StaticDestinationResolver, TableDestinationResolver,
};
use sluice_template::Dialect;
use std::path::PathBuf;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the data window of a scheduled instant
    Window(WindowArgs),
    /// Compile the assets of a job for preview
    Render(RenderArgs),
    /// Register a run locally and write its instance data
    RunInput(RunInputArgs),
    /// Load and validate every job below a directory
    Validate {
        /// Spec root to scan for job.yaml files
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

/// Template options shared by commands that compile
#[derive(Args, Debug, Clone, Default)]
pub struct TemplateArgs {
    /// Template dialect: auto, basic or rich [env: SLUICE_TEMPLATE_DIALECT]
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// Suffixes copied verbatim (comma-separated) [env: SLUICE_IGNORE_SUFFIXES]
    #[arg(long, value_delimiter = ',')]
    pub ignore_suffixes: Option<Vec<String>>,
}

impl TemplateArgs {
    /// Applies explicit flags over a configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        if let Some(suffixes) = &self.ignore_suffixes {
            config.ignore_suffixes = suffixes.clone();
        }
    }
}

/// Destination options shared by commands that resolve a destination
#[derive(Args, Debug, Clone)]
pub struct DestinationArgs {
    /// Datastore name used in resolved URNs
    #[arg(long, env = "SLUICE_DATASTORE", default_value = "bigquery")]
    pub datastore: String,

    /// Fixed destination URN, skips resolution from task config
    #[arg(long)]
    pub destination: Option<String>,
}

impl DestinationArgs {
    /// Resolvers for local runs
    ///
    /// Every task resolves a table destination from `PROJECT`, `DATASET` and
    /// `TABLE` unless a fixed destination is given.
    pub fn resolvers(&self) -> DestinationResolvers {
        match &self.destination {
            Some(urn) => {
                DestinationResolvers::new().with_fallback(StaticDestinationResolver::new(urn, "custom"))
            }
            None => DestinationResolvers::new()
                .with_fallback(TableDestinationResolver::new(self.datastore.as_str())),
        }
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Window(args) => window::handle_window_command(args),
        Commands::Render(args) => render::handle_render_command(args),
        Commands::RunInput(args) => run_input::handle_run_input_command(args).await,
        Commands::Validate { dir } => validate::handle_validate_command(&dir),
    }
}

/// Parses an RFC 3339 instant given on the command line
fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    sluice_core::time::parse_rfc3339(input)
        .with_context(|| format!("invalid instant '{}', expected RFC 3339 such as 2020-11-11T00:00:00Z", input))
}

/// Base configuration from the environment with explicit flags on top
fn load_config(template: &TemplateArgs) -> Result<Config> {
    let mut config = Config::from_env()?;
    template.apply(&mut config);
    config.validate()?;
    Ok(config)
}
