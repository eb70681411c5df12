//! Core implementation of opencmd
//!
//! opencmd runs project-local scripts by name from anywhere inside a project tree. A name is
//! resolved by searching the commands directory of the current directory and each of its
//! ancestors, nearest first. The script found is classified (binary or text, shebang, execute
//! bit) and then started through an ordered cascade of strategies until one of them runs it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::cascade::{ExecSettings, ExecutionCascade, Strategy, StrategyError};
use crate::commands::classify::{ClassifyError, classify};
use crate::commands::locator::{CommandLocator, CommandReference, LocateError};
use crate::config_file::{Config, ConfigError, WorkingDir};
use crate::fs::FileSystem;
use crate::process::ProcessRunner;

pub mod cascade;
pub mod commands;
pub mod config_file;
pub mod fs;
pub mod logger;
pub mod output;
pub mod process;

/// Load configuration from an explicit file, or discover one from `start` upward.
///
/// Without an explicit file and without a discovered one, the defaults apply.
///
/// # Errors
///
/// Returns `ConfigError` if the explicit file does not exist, or if the file used cannot be
/// read, parsed or validated.
pub fn load_config(config_file: Option<&Path>, start: &Path) -> Result<Config, ConfigError> {
    let config_path = match config_file {
        Some(file) => {
            if !file.exists() {
                return Err(ConfigError::ConfigNotFound(file.to_path_buf()));
            }
            Some(file.to_path_buf())
        }
        None => Config::find_config(start),
    };
    match config_path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            Config::from_file(&path)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    NotFound(#[from] LocateError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    /// Every strategy failed; `output` is what the last one captured
    #[error("{source}")]
    Exhausted {
        name: String,
        output: String,
        #[source]
        source: StrategyError,
    },
}

/// A script that was run to an exit code
#[derive(Debug)]
pub struct RunOutcome {
    pub reference: CommandReference,
    pub strategy: Strategy,
    pub output: String,
    pub exit_code: Option<i32>,
}

/// Resolves and runs scripts with injected filesystem, process runner and configuration.
pub struct Engine<'a> {
    config: &'a Config,
    fs: &'a dyn FileSystem,
    runner: &'a dyn ProcessRunner,
    env_shell: Option<OsString>,
}

impl<'a> Engine<'a> {
    /// Create an engine that takes the fallback shell's environment value from `$SHELL`.
    #[must_use]
    pub fn new(config: &'a Config, fs: &'a dyn FileSystem, runner: &'a dyn ProcessRunner) -> Self {
        Engine {
            config,
            fs,
            runner,
            env_shell: std::env::var_os("SHELL"),
        }
    }

    /// Replace the value read from `$SHELL`.
    #[must_use]
    pub fn with_env_shell(mut self, env_shell: Option<OsString>) -> Self {
        self.env_shell = env_shell;
        self
    }

    fn locator(&self) -> CommandLocator<'a> {
        CommandLocator::new(self.fs, self.config)
    }

    /// Resolve `name` from `start` upward.
    ///
    /// # Errors
    ///
    /// Returns `LocateError::NotFound` if no ancestor has such a script.
    pub fn locate(&self, start: &Path, name: &str) -> Result<CommandReference, LocateError> {
        self.locator().locate(start, name)
    }

    /// Every script reachable from `start`, nearest ancestor first.
    #[must_use]
    pub fn list(&self, start: &Path) -> Vec<CommandReference> {
        self.locator().list_all(start)
    }

    fn working_dir(&self, cwd: &Path, reference: &CommandReference) -> PathBuf {
        match self.config.working_dir {
            WorkingDir::Invocation => cwd.to_path_buf(),
            WorkingDir::ProjectRoot => reference.root.clone(),
        }
    }

    /// Resolve `name` from `cwd`, classify the script and run it through the cascade.
    ///
    /// # Errors
    ///
    /// Returns `RunError::NotFound` if the script cannot be resolved, `RunError::Classify` if
    /// it cannot be inspected, or `RunError::Exhausted` with the last strategy's output and
    /// error if no strategy could run it.
    pub fn run(&self, cwd: &Path, name: &str, args: &[OsString]) -> Result<RunOutcome, RunError> {
        let reference = self.locate(cwd, name)?;
        let classification = classify(self.fs, &reference.path)?;

        let settings = ExecSettings {
            shell: self.config.resolve_shell(self.env_shell.clone()),
            working_dir: self.working_dir(cwd, &reference),
            args: args.to_vec(),
        };
        let result = ExecutionCascade::new(self.runner, settings).execute(&reference, &classification);

        match result.error {
            Some(source) if !result.done => Err(RunError::Exhausted {
                name: reference.name,
                output: result.output,
                source,
            }),
            _ => Ok(RunOutcome {
                reference,
                strategy: result.strategy,
                output: result.output,
                exit_code: result.exit_code,
            }),
        }
    }
}
