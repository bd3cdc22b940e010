//! Instance data writer
//!
//! Serializes a run context into the instance directory:
//!
//! ```text
//! <output_dir>/in/
//!   <file>      one per compiled file
//!   .env        KEY='VALUE' per plain env entry
//!   .secret     KEY='VALUE' per secret env entry
//! ```

use sluice_template::NO_VALUE;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

use crate::context::{EnvMap, RunContext};
use crate::error::{Result, RuntimeError};

/// Directory under the output dir that receives the instance data
pub const INSTANCE_DIR: &str = "in";
pub const ENV_FILE: &str = ".env";
pub const SECRET_FILE: &str = ".secret";

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// What a write produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    /// Every path written, in write order
    pub written: Vec<PathBuf>,
    /// Keys whose value still contains `<no value>`
    pub keys_with_unsubstituted_value: Vec<String>,
}

impl DumpReport {
    pub fn has_unsubstituted(&self) -> bool {
        !self.keys_with_unsubstituted_value.is_empty()
    }
}

/// Writes run contexts to disk
#[derive(Debug, Clone)]
pub struct InstanceDataWriter {
    output_dir: PathBuf,
}

impl InstanceDataWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory the files end up in
    pub fn instance_dir(&self) -> PathBuf {
        self.output_dir.join(INSTANCE_DIR)
    }

    /// Writes files, `.env` and `.secret`
    ///
    /// Unsubstituted values are reported, not rejected.
    ///
    /// # Errors
    /// `RuntimeError::Io` on filesystem failures, or when a file name would
    /// escape the instance directory or replace `.env` or `.secret`. Names
    /// are checked before anything is written.
    pub fn write(&self, context: &RunContext) -> Result<DumpReport> {
        for name in context.files.keys() {
            check_file_name(name)?;
        }

        let dir = self.instance_dir();
        create_dir(&dir)?;

        let mut report = DumpReport::default();

        for (name, content) in &context.files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }
            write_file(&path, content.as_bytes())?;
            if content.contains(NO_VALUE) {
                report.keys_with_unsubstituted_value.push(name.clone());
            }
            report.written.push(path);
        }

        for (file, env) in [(ENV_FILE, &context.env), (SECRET_FILE, &context.secret_env)] {
            let path = dir.join(file);
            write_file(&path, render_env(env).as_bytes())?;
            report
                .keys_with_unsubstituted_value
                .extend(env.iter().filter(|(_, v)| v.contains(NO_VALUE)).map(|(k, _)| k.to_string()));
            report.written.push(path);
        }

        if report.has_unsubstituted() {
            warn!(
                keys = ?report.keys_with_unsubstituted_value,
                "Values contain {} after template expansion",
                NO_VALUE
            );
        }
        info!(dir = %dir.display(), files = report.written.len(), "Wrote instance data");
        Ok(report)
    }
}

/// `KEY='VALUE'\n` per entry, in map order
pub fn render_env(env: &EnvMap) -> String {
    env.iter()
        .map(|(key, value)| format!("{}='{}'\n", key, value))
        .collect()
}

/// Checks that a file name stays below the directory it is joined to
///
/// Only plain components are allowed: no root, no `..`, no `.`.
///
/// # Errors
/// `RuntimeError::Io` with `InvalidInput` otherwise
pub fn safe_relative(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let normal = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !normal {
        return Err(invalid_name(format!("file name '{}' escapes the instance directory", name)));
    }
    Ok(path)
}

fn check_file_name(name: &str) -> Result<()> {
    let path = safe_relative(name)?;
    if path == Path::new(ENV_FILE) || path == Path::new(SECRET_FILE) {
        return Err(invalid_name(format!(
            "file name '{}' collides with the generated env files",
            name
        )));
    }
    Ok(())
}

fn invalid_name(message: String) -> RuntimeError {
    RuntimeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
}

#[cfg(unix)]
fn create_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    DirBuilder::new().recursive(true).mode(DIR_MODE).create(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> Result<()> {
    let _ = DIR_MODE;
    DirBuilder::new().recursive(true).create(path)?;
    Ok(())
}

#[cfg(unix)]
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let _ = FILE_MODE;
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    file.write_all(bytes)?;
    Ok(())
}
