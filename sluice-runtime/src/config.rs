//! Runtime configuration
//!
//! Defines where instance data is written and how templates are compiled.

use sluice_template::{DEFAULT_IGNORE_SUFFIXES, Dialect, JinjaEngine};
use std::path::PathBuf;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory that receives `in/` with the instance data
    pub output_dir: PathBuf,

    /// File suffixes passed through without template expansion
    pub ignore_suffixes: Vec<String>,

    /// Template dialect, `auto` detects per source
    pub dialect: Dialect,

    /// Treat `<no value>` in written data as an error instead of a warning
    pub strict_unsubstituted: bool,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ignore_suffixes: DEFAULT_IGNORE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            dialect: Dialect::Auto,
            strict_unsubstituted: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SLUICE_OUTPUT_DIR (optional, default: /tmp)
    /// - SLUICE_IGNORE_SUFFIXES (optional, comma separated, default: .gtpl,.j2,.tmpl,.tpl)
    /// - SLUICE_TEMPLATE_DIALECT (optional, auto|basic|rich, default: auto)
    /// - SLUICE_STRICT_UNSUBSTITUTED (optional, true|false, default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SLUICE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Ok(suffixes) = std::env::var("SLUICE_IGNORE_SUFFIXES") {
            config.ignore_suffixes = parse_suffixes(&suffixes);
        }

        if let Ok(dialect) = std::env::var("SLUICE_TEMPLATE_DIALECT") {
            config.dialect = dialect
                .parse()
                .map_err(|e: String| anyhow::anyhow!("SLUICE_TEMPLATE_DIALECT: {}", e))?;
        }

        config.strict_unsubstituted = std::env::var("SLUICE_STRICT_UNSUBSTITUTED")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        Ok(config)
    }

    /// Template engine built from this configuration
    pub fn engine(&self) -> JinjaEngine {
        JinjaEngine::new()
            .with_dialect(self.dialect)
            .with_ignore_suffixes(self.ignore_suffixes.iter().cloned())
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("output_dir cannot be empty");
        }

        if let Some(bad) = self.ignore_suffixes.iter().find(|s| !s.starts_with('.') || s.len() < 2) {
            anyhow::bail!("ignore suffix '{}' must start with '.' followed by an extension", bad);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("/tmp")
    }
}

/// Splits a comma separated suffix list, dropping blanks
pub fn parse_suffixes(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
