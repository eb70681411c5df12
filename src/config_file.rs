//! Configuration file handling for opencmd

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::ancestors::Ancestors;

/// Marker directory name used when nothing else is configured
pub const DEFAULT_MARKER_DIR: &str = ".opencmd";
/// Commands sub-directory name used when nothing else is configured
pub const DEFAULT_COMMANDS_DIR: &str = "commands";
/// Shell used when neither the config nor `$SHELL` names one
pub const FALLBACK_SHELL: &str = "/bin/bash";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Directory a script is started in
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkingDir {
    /// The directory `opencmd` was invoked from
    #[default]
    Invocation,
    /// The ancestor directory that holds the marker directory
    ProjectRoot,
}

/// Settings consumed by the locator and the execution cascade
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub marker_dir: String,
    pub commands_dir: String,
    pub default_shell: Option<PathBuf>,
    pub working_dir: WorkingDir,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            marker_dir: DEFAULT_MARKER_DIR.to_string(),
            commands_dir: DEFAULT_COMMANDS_DIR.to_string(),
            default_shell: None,
            working_dir: WorkingDir::default(),
        }
    }
}

/// List of supported configuration file names, inside the default marker directory
const FILENAMES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

impl Config {
    /// `<dir>/<marker_dir>/<commands_dir>`
    #[must_use]
    pub fn commands_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.marker_dir).join(&self.commands_dir)
    }

    /// Shell for the fallback strategy: configured value, else `env_shell`, else
    /// [`FALLBACK_SHELL`]. Empty values count as unset.
    #[must_use]
    pub fn resolve_shell(&self, env_shell: Option<OsString>) -> PathBuf {
        self.default_shell
            .clone()
            .filter(|shell| !shell.as_os_str().is_empty())
            .or_else(|| env_shell.filter(|s| !s.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_SHELL))
    }

    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file does not exist, `ConfigError::Read`
    /// if it cannot be read, `ConfigError::Yaml`/`ConfigError::Json` if parsing fails, or
    /// `ConfigError::Validation` for unusable values.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::ConfigNotFound(file.to_path_buf())
            } else {
                ConfigError::Read {
                    path: file.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let config: Config = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Searches `start` and its parents for a config file in the marker directory.
    #[must_use]
    pub fn find_config(start: &Path) -> Option<PathBuf> {
        debug!("Searching for config file from {}", start.display());
        for dir in Ancestors::new(start) {
            for file in &FILENAMES {
                let config_path = dir.join(DEFAULT_MARKER_DIR).join(file);
                if config_path.is_file() {
                    info!("Found config file: {}", config_path.display());
                    return Some(config_path);
                }
            }
        }
        None
    }

    /// Check that directory names are single relative components and the shell is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_dir_name("marker_dir", &self.marker_dir)?;
        check_dir_name("commands_dir", &self.commands_dir)?;
        if self
            .default_shell
            .as_ref()
            .is_some_and(|shell| shell.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(
                "default_shell must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_dir_name(field: &str, value: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{field} must be a single directory name, got '{value}'"
        ))),
    }
}
