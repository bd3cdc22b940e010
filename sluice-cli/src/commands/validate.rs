//! Validate command handler

use anyhow::{Result, bail};
use colored::*;
use std::path::Path;

use crate::spec::SpecLoader;

/// Handle `sluice validate`
///
/// Loads every job below `dir` and runs spec validation on it. All jobs are
/// reported before the command fails.
pub fn handle_validate_command(dir: &Path) -> Result<()> {
    let loader = SpecLoader::new(dir)?;
    let failures = validate_all(&loader)?;

    if failures > 0 {
        bail!("{} job(s) failed validation", failures);
    }
    Ok(())
}

/// Prints one line per job and returns the number of failures
fn validate_all(loader: &SpecLoader) -> Result<usize> {
    let dirs = loader.discover()?;
    if dirs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(0);
    }

    let mut failures = 0;
    for dir in &dirs {
        let shown = dir.strip_prefix(loader.root()).unwrap_or(dir).display();
        let result = loader
            .load_job(dir)
            .and_then(|job| job.validate().map(|_| job).map_err(Into::into));

        match result {
            Ok(job) => println!("{} {} ({})", "✓".green(), job.name.bold(), shown),
            Err(e) => {
                failures += 1;
                println!("{} {}: {:#}", "✗".red(), shown, e);
            }
        }
    }

    println!();
    println!(
        "{}",
        format!("Validated {} job(s), {} failed", dirs.len(), failures).bold()
    );
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_job(root: &Path, dir: &str, body: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("job.yaml"), body).unwrap();
    }

    const VALID: &str = "version: 1\nschedule:\n  start_date: 2021-01-01\n  interval: \"@daily\"\ntask:\n  name: python\n";

    #[test]
    fn test_validate_counts_failures() {
        let tmp = tempfile::tempdir().unwrap();
        write_job(tmp.path(), "team/good_job", VALID);
        write_job(tmp.path(), "team/no_interval", "version: 1\nschedule:\n  start_date: 2021-01-01\ntask:\n  name: python\n");
        write_job(tmp.path(), "team/broken", "task: [");

        let loader = SpecLoader::new(tmp.path()).unwrap();
        assert_eq!(validate_all(&loader).unwrap(), 2);
        assert!(handle_validate_command(tmp.path()).is_err());
    }

    #[test]
    fn test_validate_passes() {
        let tmp = tempfile::tempdir().unwrap();
        write_job(tmp.path(), "team/good_job", VALID);
        assert!(handle_validate_command(tmp.path()).is_ok());
    }
}
