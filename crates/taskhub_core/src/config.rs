//! Process configuration read from the environment.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Without `TASKHUB_POLICY_PATH` the built-in authorization policy applies.

use crate::authz::{AuthorizationPolicy, PolicyError};
use crate::logging::default_log_level;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "TASKHUB_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "TASKHUB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKHUB_LOG_DIR";
pub const ENV_POLICY_PATH: &str = "TASKHUB_POLICY_PATH";

const DEFAULT_DB_PATH: &str = "taskhub.sqlite3";

/// Runtime settings for embedding processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: default_log_level().to_string(),
            log_dir: None,
            policy_path: None,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            db_path: read(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            policy_path: read(ENV_POLICY_PATH).map(PathBuf::from),
        }
    }

    /// Loads the configured policy file, or the built-in policy.
    pub fn load_policy(&self) -> Result<AuthorizationPolicy, PolicyError> {
        match &self.policy_path {
            Some(path) => AuthorizationPolicy::load(path),
            None => Ok(AuthorizationPolicy::standard()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_POLICY_PATH};
    use crate::authz::{Action, AuthorizationPolicy};
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[(ENV_DB_PATH, "   ")]));
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.db_path, PathBuf::from("taskhub.sqlite3"));
    }

    #[test]
    fn reads_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/taskhub/db.sqlite3"),
            (ENV_LOG_LEVEL, "warn"),
        ]));
        assert_eq!(config.db_path, PathBuf::from("/var/lib/taskhub/db.sqlite3"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn load_policy_defaults_to_standard() {
        let config = CoreConfig::default();
        assert_eq!(config.load_policy().unwrap(), AuthorizationPolicy::standard());
    }

    #[test]
    fn load_policy_reads_configured_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"open_actions": ["view_project", "create_task"]}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = CoreConfig::from_lookup(lookup(&[(ENV_POLICY_PATH, path.as_str())]));
        let policy = config.load_policy().unwrap();
        assert!(policy.is_open(Action::CreateTask));
        assert!(policy.requirements(Action::DeleteTask).is_none());
    }
}
