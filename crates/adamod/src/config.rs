//! Configuration for adamod.
//!
//! Supports loading configuration from:
//! - `~/.config/adamod/config.toml` for user defaults
//! - `adamod.toml` in the current directory
//! - a file named with `--config`
//! - Environment variables (ADAMOD_*)
//!
//! Command-line arguments are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default target.
    pub target: TargetConfig,
    /// Search settings.
    pub search: SearchConfig,
    /// Emulated database settings.
    pub database: DatabaseConfig,
    /// Diagnostic trace log settings.
    pub trace: TraceConfig,
}

/// Default database and file for `-t`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Database id.
    pub database: Option<u16>,
    /// File number.
    pub file: Option<u16>,
}

/// Search settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// ISN buffer entries per `S1` call.
    pub page_capacity: Option<u32>,
}

/// Emulated database settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the JSON database image.
    pub image: Option<PathBuf>,
}

/// Trace log settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Log file; tracing stays off unless this or `RUST_LOG` is set.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl Config {
    /// Load configuration from default locations, then `explicit`, then the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(user_config) = Self::user_config_path() {
            if let Some(c) = Self::load_if_present(&user_config)? {
                config = config.merge(c);
            }
        }

        if let Some(c) = Self::load_if_present(Path::new("adamod.toml"))? {
            config = config.merge(c);
        }

        if let Some(path) = explicit {
            config = config.merge(Self::load_from_file(path)?);
        }

        config.apply_env_vars(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    fn load_if_present(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the user configuration file path.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("adamod").join("config.toml"))
    }

    /// Merge another config into this one (values set in `other` win).
    pub fn merge(mut self, other: Config) -> Self {
        if other.target.database.is_some() {
            self.target.database = other.target.database;
        }
        if other.target.file.is_some() {
            self.target.file = other.target.file;
        }
        if other.search.page_capacity.is_some() {
            self.search.page_capacity = other.search.page_capacity;
        }
        if other.database.image.is_some() {
            self.database.image = other.database.image;
        }
        if other.trace.file.is_some() {
            self.trace.file = other.trace.file;
        }
        if other.trace.filter.is_some() {
            self.trace.filter = other.trace.filter;
        }
        self
    }

    /// Apply `ADAMOD_*` variables read through `lookup`.
    pub fn apply_env_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ADAMOD_DATABASE_IMAGE") {
            self.database.image = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("ADAMOD_PAGE_CAPACITY") {
            if let Ok(capacity) = val.trim().parse() {
                self.search.page_capacity = Some(capacity);
            }
        }
        if let Some(val) = lookup("ADAMOD_TRACE_FILE") {
            self.trace.file = Some(PathBuf::from(val));
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a config file.
    #[error("I/O error for {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    /// Parse error in a config file.
    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target.database, None);
        assert_eq!(config.search.page_capacity, None);
        assert_eq!(config.database.image, None);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[target]
database = 12
file = 5

[search]
page_capacity = 250

[database]
image = "db/employees.json"

[trace]
file = "adamod.log"
filter = "adamod=debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.target.database, Some(12));
        assert_eq!(config.target.file, Some(5));
        assert_eq!(config.search.page_capacity, Some(250));
        assert_eq!(config.database.image, Some(PathBuf::from("db/employees.json")));
        assert_eq!(config.trace.filter.as_deref(), Some("adamod=debug"));
    }

    #[test]
    fn test_merge_config() {
        let base: Config = toml::from_str("[target]\ndatabase = 1\nfile = 2\n").unwrap();
        let project: Config = toml::from_str("[target]\nfile = 9\n").unwrap();
        let merged = base.merge(project);
        assert_eq!(merged.target.database, Some(1));
        assert_eq!(merged.target.file, Some(9));
    }

    #[test]
    fn test_env_vars() {
        let mut config = Config::default();
        config.apply_env_vars(|name| match name {
            "ADAMOD_DATABASE_IMAGE" => Some("/tmp/db.json".to_string()),
            "ADAMOD_PAGE_CAPACITY" => Some("50".to_string()),
            _ => None,
        });
        assert_eq!(config.database.image, Some(PathBuf::from("/tmp/db.json")));
        assert_eq!(config.search.page_capacity, Some(50));
        assert_eq!(config.trace.file, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adamod.toml");
        std::fs::write(&path, "[search]\npage_capacity = 10\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.search.page_capacity, Some(10));

        std::fs::write(&path, "[search\n").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::load_from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
