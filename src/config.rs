//! Configuration loading.
//!
//! Sources, lowest to highest precedence: built-in defaults, `~/.tsheet/config.yaml`
//! (or an explicit `--config` file), then `TSHEET_*` environment variables. Command
//! line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::fields::WeekStart;

pub const ENV_RECORDS: &str = "TSHEET_RECORDS";
pub const ENV_STATE: &str = "TSHEET_STATE";
pub const ENV_WEEK_START: &str = "TSHEET_WEEK_START";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// JSON file holding the task records.
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,

    /// JSON file holding warning hashes and dismissals.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// First day of the week used to pick the current week.
    #[serde(default)]
    pub week_start: WeekStart,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            state_path: default_state_path(),
            week_start: WeekStart::default(),
        }
    }
}

/// `~/.tsheet`, or `./.tsheet` when no home directory is known.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tsheet")
}

fn default_records_path() -> PathBuf {
    data_dir().join("records.json")
}

fn default_state_path() -> PathBuf {
    data_dir().join("state.json")
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load from `explicit` if given, else from the default location if present,
    /// then apply environment overrides.
    ///
    /// An explicit file that cannot be read is an error; a broken default file is
    /// reported and ignored.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = data_dir().join("config.yaml");
                if path.exists() {
                    Self::load(&path).unwrap_or_else(|e| {
                        warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                        Self::default()
                    })
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply `TSHEET_*` overrides read through `var`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var(ENV_RECORDS).filter(|s| !s.is_empty()) {
            self.records_path = PathBuf::from(path);
        }
        if let Some(path) = var(ENV_STATE).filter(|s| !s.is_empty()) {
            self.state_path = PathBuf::from(path);
        }
        if let Some(day) = var(ENV_WEEK_START) {
            match WeekStart::from_str(&day, true) {
                Ok(week_start) => self.week_start = week_start,
                Err(_) => warn!(value = %day, "Ignoring invalid {}", ENV_WEEK_START),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_yaml_with_partial_fields() {
        let config = Config::from_yaml("week_start: sunday\nrecords_path: /tmp/r.json\n").unwrap();
        assert_eq!(config.week_start, WeekStart::Sunday);
        assert_eq!(config.records_path, PathBuf::from("/tmp/r.json"));
        assert_eq!(config.state_path, default_state_path());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Config::from_yaml("week_start: [").is_err());
        assert!(Config::from_yaml("week_start: friday").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_RECORDS, "/data/records.json"),
            (ENV_WEEK_START, "Sunday"),
        ]);
        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|s| s.to_string()));
        assert_eq!(config.records_path, PathBuf::from("/data/records.json"));
        assert_eq!(config.state_path, default_state_path());
        assert_eq!(config.week_start, WeekStart::Sunday);
    }

    #[test]
    fn test_invalid_env_week_start_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|name| (name == ENV_WEEK_START).then(|| "someday".to_string()));
        assert_eq!(config.week_start, WeekStart::Monday);
    }
}
