//! Reserved context keys and prefixes

/// Window start, inclusive
pub const DSTART: &str = "DSTART";
/// Window end, exclusive
pub const DEND: &str = "DEND";
/// Instant the run was registered
pub const EXECUTION_TIME: &str = "EXECUTION_TIME";
/// Destination URN of the job
pub const JOB_DESTINATION: &str = "JOB_DESTINATION";

/// Keys bound at registration, immutable afterwards
pub const RESERVED_KEYS: [&str; 4] = [DSTART, DEND, EXECUTION_TIME, JOB_DESTINATION];

/// Prefix of project config keys
pub const GLOBAL_PREFIX: &str = "GLOBAL__";
/// Prefix of task config keys as seen by hooks
pub const TASK_PREFIX: &str = "TASK__";

/// Dotted namespaces
pub const PROJECT_NAMESPACE: &str = "proj";
pub const INSTANCE_NAMESPACE: &str = "inst";
pub const TASK_NAMESPACE: &str = "task";
pub const SECRET_NAMESPACE: &str = "secret";

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}
