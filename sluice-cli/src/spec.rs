//! Local spec loading
//!
//! Jobs live in their own directory below a spec root:
//!
//! ```text
//! <root>/
//!   this.yaml              defaults for every job below
//!   team/
//!     this.yaml            nearer defaults win
//!     sample_select/
//!       job.yaml
//!       assets/query.sql
//! ```
//!
//! Defaults and the job file are merged as YAML trees before they are read
//! into a [`JobSpec`]. Mappings merge key by key, lists of named items (hooks)
//! merge by `name`, anything else is replaced.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use sluice_core::Window;
use sluice_core::domain::{
    Behavior, ConfigEntry, Dependency, DependencyType, Hook, HttpDependency, JobMetadata, JobSpec,
    NamespaceSpec, Notifier, ProjectSpec, ResourceConfig, Retry, Schedule, Task,
};
use sluice_core::time::parse_rfc3339;
use sluice_core::window::parse_duration;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const JOB_FILE: &str = "job.yaml";
pub const DEFAULTS_FILE: &str = "this.yaml";
pub const ASSETS_DIR: &str = "assets";

/// Loads job specs below a spec root
#[derive(Debug, Clone)]
pub struct SpecLoader {
    root: PathBuf,
}

impl SpecLoader {
    /// Creates a loader rooted at `root`
    ///
    /// # Errors
    /// Returns an error if the root does not exist
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .with_context(|| format!("spec root {} does not exist", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the job in `dir`, applying every `this.yaml` from the root down
    ///
    /// # Errors
    /// Returns an error if a file cannot be read or parsed. The job is not
    /// validated here.
    pub fn load_job(&self, dir: impl AsRef<Path>) -> Result<JobSpec> {
        let dir = dir.as_ref();
        let dir = fs::canonicalize(dir)
            .with_context(|| format!("job directory {} does not exist", dir.display()))?;
        let job_path = dir.join(JOB_FILE);

        let mut merged = Value::Mapping(Mapping::new());
        for defaults in self.defaults_chain(&dir) {
            debug!(path = %defaults.display(), "Applying defaults");
            merge(&mut merged, read_yaml(&defaults)?);
        }
        merge(&mut merged, read_yaml(&job_path)?);

        let file: JobFile = serde_yaml::from_value(merged)
            .with_context(|| format!("failed to parse {}", job_path.display()))?;
        let assets = read_assets(&dir.join(ASSETS_DIR))?;

        file.into_spec(self.default_name(&dir), assets)
            .with_context(|| format!("invalid job file {}", job_path.display()))
    }

    /// Directories below the root that contain a `job.yaml`, sorted
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            if dir.join(JOB_FILE).is_file() {
                found.push(dir.clone());
            }
            let entries =
                fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() && path.file_name().is_some_and(|name| name != ASSETS_DIR) {
                    pending.push(path);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// `this.yaml` files from the root down to `dir` that exist
    fn defaults_chain(&self, dir: &Path) -> Vec<PathBuf> {
        let mut chain: Vec<PathBuf> = if dir.starts_with(&self.root) {
            dir.ancestors()
                .take_while(|p| p.starts_with(&self.root))
                .map(|p| p.join(DEFAULTS_FILE))
                .collect()
        } else {
            vec![dir.join(DEFAULTS_FILE)]
        };
        chain.reverse();
        chain.retain(|p| p.is_file());
        chain
    }

    /// Dotted path of `dir` relative to the root
    fn default_name(&self, dir: &Path) -> String {
        let relative: Vec<String> = dir
            .strip_prefix(&self.root)
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        if relative.is_empty() {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            relative.join(".")
        }
    }
}

/// Loads a `project.yaml`
pub fn load_project(path: impl AsRef<Path>) -> Result<ProjectSpec> {
    let path = path.as_ref();
    let file: ProjectFile = serde_yaml::from_value(read_yaml(path)?)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut project = ProjectSpec::new(file.name, string_map(&file.config)?.into_iter().collect());
    for (name, value) in string_map(&file.secrets)? {
        project = project.with_secret(name, value);
    }
    if let Some(namespace) = file.namespace {
        project = project.with_namespace(NamespaceSpec {
            name: namespace.name,
            config: string_map(&namespace.config)?.into_iter().collect(),
        });
    }
    Ok(project)
}

fn read_yaml(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

fn read_assets(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut assets = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(assets);
    }

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current)
            .with_context(|| format!("failed to read {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let name = path
                .strip_prefix(dir)
                .map(|p| {
                    p.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .with_context(|| format!("asset {} is outside {}", path.display(), dir.display()))?;
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read asset {}", path.display()))?;
            assets.insert(name, content);
        }
    }
    Ok(assets)
}

/// Merges `overlay` into `base`, overlay wins
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Sequence(base), Value::Sequence(overlay))
            if is_named(base.as_slice()) && is_named(&overlay) =>
        {
            for item in overlay {
                let name = item.get("name").cloned();
                match base.iter_mut().find(|b| b.get("name") == name.as_ref()) {
                    Some(existing) => merge(existing, item),
                    None => base.push(item),
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn is_named(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|item| item.get("name").is_some())
}

fn scalar_string(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(anyhow!("expected a scalar value")),
    }
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_string(&value).map_err(serde::de::Error::custom)
}

/// Scalar mapping as ordered pairs
fn string_map(mapping: &Mapping) -> Result<Vec<(String, String)>> {
    mapping
        .iter()
        .map(|(key, value)| {
            let key = scalar_string(key)?;
            let value = scalar_string(value).with_context(|| format!("key '{}'", key))?;
            Ok((key, value))
        })
        .collect()
}

fn config_entries(mapping: &Mapping) -> Result<Vec<ConfigEntry>> {
    Ok(string_map(mapping)?
        .into_iter()
        .map(|(name, value)| ConfigEntry::new(name, value))
        .collect())
}

/// `YYYY-MM-DD` as midnight UTC, or a full RFC 3339 timestamp
fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    parse_rfc3339(input).map_err(|_| anyhow!("invalid date '{}', expected YYYY-MM-DD", input))
}

/// Duration string, or a bare number of seconds
fn parse_delay(input: &str) -> Result<TimeDelta> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(TimeDelta::zero());
    }
    if let Ok(seconds) = input.parse::<i64>() {
        return TimeDelta::try_seconds(seconds)
            .ok_or_else(|| anyhow!("delay of {} seconds is out of range", seconds));
    }
    Ok(parse_duration(input)?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobFile {
    version: u32,
    name: Option<String>,
    owner: String,
    description: String,
    schedule: ScheduleFile,
    behavior: BehaviorFile,
    task: TaskFile,
    labels: Mapping,
    hooks: Vec<HookFile>,
    dependencies: Vec<DependencyFile>,
    metadata: MetadataFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleFile {
    #[serde(deserialize_with = "scalar")]
    start_date: String,
    #[serde(deserialize_with = "scalar")]
    end_date: String,
    interval: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BehaviorFile {
    depends_on_past: bool,
    catch_up: bool,
    retry: RetryFile,
    notify: Vec<NotifierFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetryFile {
    count: u32,
    #[serde(deserialize_with = "scalar")]
    delay: String,
    exponential_backoff: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NotifierFile {
    on: String,
    config: Mapping,
    channels: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskFile {
    name: String,
    config: Mapping,
    window: WindowFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindowFile {
    #[serde(deserialize_with = "scalar")]
    size: String,
    #[serde(deserialize_with = "scalar")]
    offset: String,
    #[serde(deserialize_with = "scalar")]
    truncate_to: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HookFile {
    name: String,
    config: Mapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DependencyFile {
    job: String,
    #[serde(rename = "type")]
    dependency_type: String,
    http: Option<HttpFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpFile {
    name: String,
    url: String,
    headers: Mapping,
    params: Mapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataFile {
    resource: Option<ResourceFile>,
    airflow: SchedulerFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceFile {
    request: ResourceValues,
    limit: ResourceValues,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceValues {
    memory: Option<String>,
    cpu: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SchedulerFile {
    pool: Option<String>,
    queue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectFile {
    name: String,
    config: Mapping,
    secrets: Mapping,
    namespace: Option<NamespaceFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamespaceFile {
    name: String,
    config: Mapping,
}

impl JobFile {
    fn into_spec(self, default_name: String, assets: BTreeMap<String, String>) -> Result<JobSpec> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(default_name);

        let window = &self.task.window;
        let window = Window::parse(self.version, &window.size, &window.offset, &window.truncate_to)
            .context("task window")?;

        let end_date = match self.schedule.end_date.trim() {
            "" => None,
            date => Some(parse_date(date).context("schedule end_date")?),
        };
        let schedule = Schedule {
            start_date: parse_date(&self.schedule.start_date).context("schedule start_date")?,
            end_date,
            interval: self.schedule.interval,
        };

        let notify = self
            .behavior
            .notify
            .into_iter()
            .map(|n| {
                Ok(Notifier {
                    on: n.on,
                    config: string_map(&n.config)?.into_iter().collect(),
                    channels: n.channels,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let behavior = Behavior {
            depends_on_past: self.behavior.depends_on_past,
            catchup: self.behavior.catch_up,
            retry: Retry {
                count: self.behavior.retry.count,
                delay: parse_delay(&self.behavior.retry.delay).context("retry delay")?,
                exponential_backoff: self.behavior.retry.exponential_backoff,
            },
            notify,
        };

        let hooks = self
            .hooks
            .into_iter()
            .map(|h| {
                let config = config_entries(&h.config).with_context(|| format!("hook '{}'", h.name))?;
                Ok(Hook { name: h.name, config })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut dependencies = BTreeMap::new();
        for dependency in self.dependencies {
            let (key, dependency) = dependency.into_dependency()?;
            dependencies.insert(key, dependency);
        }

        Ok(JobSpec {
            name,
            version: self.version,
            owner: self.owner,
            description: self.description,
            schedule,
            behavior,
            task: Task {
                name: self.task.name,
                config: config_entries(&self.task.config).context("task config")?,
                window,
            },
            assets,
            hooks,
            dependencies,
            labels: string_map(&self.labels)?.into_iter().collect(),
            metadata: self.metadata.into_metadata(),
        })
    }
}

impl DependencyFile {
    fn into_dependency(self) -> Result<(String, Dependency)> {
        let dependency_type = match self.dependency_type.trim().to_ascii_lowercase().as_str() {
            "" if self.http.is_some() => DependencyType::Extra,
            "" | "intra" => DependencyType::Intra,
            "inter" => DependencyType::Inter,
            "extra" => DependencyType::Extra,
            other => bail!("unknown dependency type '{}', expected intra, inter or extra", other),
        };

        let http = match self.http {
            Some(http) => Some(HttpDependency {
                name: http.name,
                url: http.url,
                headers: string_map(&http.headers)?.into_iter().collect(),
                params: string_map(&http.params)?.into_iter().collect(),
            }),
            None => None,
        };

        let key = match (self.job.trim(), &http) {
            ("", Some(http)) if !http.name.trim().is_empty() => http.name.clone(),
            ("", _) => bail!("dependency needs a job or an http name"),
            (job, _) => job.to_string(),
        };

        Ok((key, Dependency { dependency_type, http }))
    }
}

impl MetadataFile {
    fn into_metadata(self) -> JobMetadata {
        let resource = self.resource.map(|r| ResourceConfig {
            cpu_request: r.request.cpu,
            memory_request: r.request.memory,
            cpu_limit: r.limit.cpu,
            memory_limit: r.limit.memory,
        });

        let mut scheduler = BTreeMap::new();
        if let Some(pool) = self.airflow.pool {
            scheduler.insert("pool".to_string(), pool);
        }
        if let Some(queue) = self.airflow.queue {
            scheduler.insert("queue".to_string(), queue);
        }

        JobMetadata { resource, scheduler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sluice_core::{CalendarWindow, TaskWindow, Truncation};

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn spec_tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            &root.join("this.yaml"),
            r#"
version: 1
owner: platform@example.com
task:
  config:
    PROJECT: proj
    RETRIES: 3
  window:
    size: 24h
labels:
  orchestrator: sluice
hooks:
  - name: transporter
    config:
      BROKER: "{{ .GLOBAL__kafka }}"
"#,
        );
        write(
            &root.join("team/this.yaml"),
            r#"
owner: data@example.com
labels:
  team: data
"#,
        );
        write(
            &root.join("team/sample_select/job.yaml"),
            r#"
name: sample_select
schedule:
  start_date: "2021-02-18"
  interval: "@daily"
behavior:
  catch_up: true
  retry:
    count: 2
    delay: 5m
task:
  name: bq2bq
  config:
    DATASET: playground
    TABLE: sample
  window:
    offset: 1h
    truncate_to: h
hooks:
  - name: transporter
    config:
      SAMPLE: 200
dependencies:
  - job: upstream_job
  - http:
      name: inventory
      url: https://example.com/ready
metadata:
  resource:
    request:
      cpu: 250m
  airflow:
    pool: etl
"#,
        );
        write(&root.join("team/sample_select/assets/query.sql"), "select 1");
        write(&root.join("team/sample_select/assets/nested/part.sql"), "select 2");
        write(
            &root.join("team/unnamed/job.yaml"),
            "schedule:\n  start_date: 2021-01-01\n  interval: \"@hourly\"\ntask:\n  name: python\n",
        );
        tmp
    }

    #[test]
    fn test_load_job_merges_defaults() {
        let tmp = spec_tree();
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let job = loader.load_job(tmp.path().join("team/sample_select")).unwrap();

        assert_eq!(job.name, "sample_select");
        assert_eq!(job.version, 1);
        assert_eq!(job.owner, "data@example.com");
        assert_eq!(job.schedule.start_date, Utc.with_ymd_and_hms(2021, 2, 18, 0, 0, 0).unwrap());
        assert_eq!(job.schedule.end_date, None);
        assert!(job.behavior.catchup);
        assert_eq!(job.behavior.retry.delay, TimeDelta::minutes(5));

        let config: Vec<(&str, &str)> = job
            .task
            .config
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
            .collect();
        assert_eq!(
            config,
            vec![("PROJECT", "proj"), ("RETRIES", "3"), ("DATASET", "playground"), ("TABLE", "sample")]
        );
        assert_eq!(
            job.task.window,
            Window::V1(TaskWindow::new(TimeDelta::hours(24), TimeDelta::hours(1), Truncation::Hour))
        );

        assert_eq!(job.labels["orchestrator"], "sluice");
        assert_eq!(job.labels["team"], "data");
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_hooks_merge_by_name() {
        let tmp = spec_tree();
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let job = loader.load_job(tmp.path().join("team/sample_select")).unwrap();

        assert_eq!(job.hooks.len(), 1);
        let hook = job.hook("transporter").unwrap();
        let names: Vec<&str> = hook.config.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["BROKER", "SAMPLE"]);
        assert_eq!(hook.config[1].value, "200");
    }

    #[test]
    fn test_assets_dependencies_and_metadata() {
        let tmp = spec_tree();
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let job = loader.load_job(tmp.path().join("team/sample_select")).unwrap();

        assert_eq!(job.assets.keys().collect::<Vec<_>>(), vec!["nested/part.sql", "query.sql"]);
        assert_eq!(job.assets["query.sql"], "select 1");

        assert_eq!(job.dependencies["upstream_job"].dependency_type, DependencyType::Intra);
        let http = &job.dependencies["inventory"];
        assert_eq!(http.dependency_type, DependencyType::Extra);
        assert_eq!(http.http.as_ref().unwrap().url, "https://example.com/ready");

        let resource = job.metadata.resource.as_ref().unwrap();
        assert_eq!(resource.cpu_request.as_deref(), Some("250m"));
        assert_eq!(resource.memory_limit, None);
        assert_eq!(job.metadata.scheduler["pool"], "etl");
    }

    #[test]
    fn test_name_defaults_to_dotted_path() {
        let tmp = spec_tree();
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let job = loader.load_job(tmp.path().join("team/unnamed")).unwrap();

        assert_eq!(job.name, "team.unnamed");
        assert_eq!(job.task.window, Window::default());
        assert_eq!(job.owner, "data@example.com");
    }

    #[test]
    fn test_discover_skips_assets() {
        let tmp = spec_tree();
        write(&tmp.path().join("team/sample_select/assets/job.yaml"), "name: not_a_job");
        let loader = SpecLoader::new(tmp.path()).unwrap();

        let found = loader.discover().unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(loader.root()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["team/sample_select", "team/unnamed"]);
    }

    #[test]
    fn test_invalid_window_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("job.yaml"),
            "name: bad_window\nversion: 1\nschedule:\n  start_date: 2021-01-01\n  interval: \"@daily\"\ntask:\n  name: python\n  window:\n    truncate_to: y\n",
        );
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let err = loader.load_job(tmp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported truncate_to 'y'"));
    }

    #[test]
    fn test_load_project() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("project.yaml");
        write(
            &path,
            r#"
name: sample-project
config:
  bucket: gs://b
  port: 9092
secrets:
  TOKEN: s3cr3t
namespace:
  name: team
  config:
    bucket: gs://team
"#,
        );

        let project = load_project(&path).unwrap();
        assert_eq!(project.name, "sample-project");
        assert_eq!(project.config["port"], "9092");
        assert_eq!(project.secrets["TOKEN"], b"s3cr3t".to_vec());
        assert_eq!(project.effective_config()["bucket"], "gs://team");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2021-02-18").unwrap(),
            Utc.with_ymd_and_hms(2021, 2, 18, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2021-02-18T06:30:00Z").unwrap(),
            Utc.with_ymd_and_hms(2021, 2, 18, 6, 30, 0).unwrap()
        );
        assert!(parse_date("18/02/2021").is_err());
    }

    #[test]
    fn test_parse_delay() {
        assert_eq!(parse_delay("").unwrap(), TimeDelta::zero());
        assert_eq!(parse_delay("30").unwrap(), TimeDelta::seconds(30));
        assert_eq!(parse_delay("1h30m").unwrap(), TimeDelta::minutes(90));
    }

    #[test]
    fn test_parse_delay_out_of_range() {
        let err = parse_delay("9223372036854775807").unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(parse_delay("-9223372036854775807").is_err());
    }

    #[test]
    fn test_huge_retry_delay_fails_loading() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("job.yaml"),
            "name: slow_retry\nversion: 1\nschedule:\n  start_date: 2021-01-01\n  interval: \"@daily\"\nbehavior:\n  retry:\n    delay: 9223372036854775807\ntask:\n  name: python\n",
        );
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let err = loader.load_job(tmp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("retry delay"));
    }

    #[test]
    fn test_version_two_window_allows_months() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("job.yaml"),
            "name: monthly\nversion: 2\nschedule:\n  start_date: 2021-01-01\n  interval: \"@monthly\"\ntask:\n  name: python\n  window:\n    size: 1M\n    offset: -1M\n    truncate_to: M\n",
        );
        let loader = SpecLoader::new(tmp.path()).unwrap();
        let job = loader.load_job(tmp.path()).unwrap();

        assert_eq!(job.task.window, Window::V2(CalendarWindow::parse("1M", "-1M", "M").unwrap()));
        assert!(job.validate().is_ok());
    }
}
