use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::commands::ancestors::Ancestors;
use crate::config_file::Config;
use crate::fs::FileSystem;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("can not find command: {0}")]
    NotFound(String),
}

/// A script resolved on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReference {
    /// Base name the script is invoked by
    pub name: String,
    /// Full path of the script file
    pub path: PathBuf,
    /// Ancestor directory holding the marker directory, i.e. the project root
    pub root: PathBuf,
}

/// Finds scripts in the commands directories of a directory and its ancestors.
pub struct CommandLocator<'a> {
    fs: &'a dyn FileSystem,
    config: &'a Config,
}

impl<'a> CommandLocator<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, config: &'a Config) -> Self {
        CommandLocator { fs, config }
    }

    /// Files in the commands directory of a single ancestor, or `None` if it has none.
    ///
    /// Listing failures are logged and treated as an empty directory so one unreadable
    /// ancestor does not hide the others.
    fn commands_in(&self, dir: &Path) -> Option<Vec<PathBuf>> {
        let commands_dir = self.config.commands_path(dir);
        match self.fs.dir_exists(&commands_dir) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Skipping {}: {e}", commands_dir.display());
                return None;
            }
        }
        match self.fs.list_files(&commands_dir) {
            Ok(files) => {
                debug!(
                    "Found {} command(s) in {}",
                    files.len(),
                    commands_dir.display()
                );
                Some(files)
            }
            Err(e) => {
                warn!("Unable to list {}: {e}", commands_dir.display());
                None
            }
        }
    }

    /// Resolve `name` starting at `start`. The nearest ancestor wins; within one commands
    /// directory the first match in lexicographic path order wins.
    ///
    /// # Errors
    ///
    /// Returns `LocateError::NotFound` if no ancestor has a script called `name`.
    pub fn locate(&self, start: &Path, name: &str) -> Result<CommandReference, LocateError> {
        debug!("Looking up command '{name}' from {}", start.display());
        for dir in Ancestors::new(start) {
            let Some(files) = self.commands_in(&dir) else {
                continue;
            };
            if let Some(path) = files
                .into_iter()
                .find(|file| file.file_name().is_some_and(|base| base == name))
            {
                debug!("Resolved '{name}' to {}", path.display());
                return Ok(CommandReference {
                    name: name.to_string(),
                    path,
                    root: dir,
                });
            }
        }
        Err(LocateError::NotFound(name.to_string()))
    }

    /// Every script reachable from `start`, nearest ancestor first, without deduplication.
    #[must_use]
    pub fn list_all(&self, start: &Path) -> Vec<CommandReference> {
        let mut all = Vec::new();
        for dir in Ancestors::new(start) {
            let Some(files) = self.commands_in(&dir) else {
                continue;
            };
            all.extend(files.into_iter().map(|path| CommandReference {
                name: path
                    .file_name()
                    .map(|base| base.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path,
                root: dir.clone(),
            }));
        }
        all
    }
}
