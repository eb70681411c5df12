//! Filesystem access used by command lookup and classification
//!
//! Everything the core reads from disk goes through [`FileSystem`], so the locator and the
//! classifier can run against [`MemFs`] in tests instead of a real directory tree.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use log::debug;

/// Read-only view of a file tree.
pub trait FileSystem {
    /// Whether `path` exists and is a directory. A missing path is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` exists but cannot be inspected.
    fn dir_exists(&self, path: &Path) -> io::Result<bool>;

    /// All regular files beneath `dir`, recursively, in lexicographic path order.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Open `path` for reading. Every call returns a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Unix permission bits of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be statted.
    fn mode(&self, path: &Path) -> io::Result<u32>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn dir_exists(&self, path: &Path) -> io::Result<bool> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = dir.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("non UTF-8 directory: {}", dir.display()),
            )
        })?;
        let pattern = format!("{}/**/*", Pattern::escape(dir.trim_end_matches('/')));
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let entries = glob::glob_with(&pattern, options)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable entry under {dir}: {e}"),
            }
        }
        files.sort();
        Ok(files)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    #[cfg(unix)]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        use std::os::unix::fs::PermissionsExt;
        Ok(std::fs::metadata(path)?.permissions().mode())
    }

    #[cfg(not(unix))]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        // No execute bit to report; only the stat result matters here.
        std::fs::metadata(path).map(|_| 0)
    }
}

#[derive(Debug, Clone)]
struct MemFile {
    contents: Vec<u8>,
    mode: u32,
}

/// In-memory file tree. Directories exist implicitly as ancestors of files.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: BTreeMap<PathBuf, MemFile>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with mode `0o644`.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.add_file_with_mode(path, contents, 0o644);
    }

    pub fn add_file_with_mode(
        &mut self,
        path: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
        mode: u32,
    ) {
        self.files.insert(
            path.into(),
            MemFile {
                contents: contents.into(),
                mode,
            },
        );
    }

    fn get(&self, path: &Path) -> io::Result<&MemFile> {
        self.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

impl FileSystem for MemFs {
    fn dir_exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self
            .files
            .keys()
            .any(|file| file != path && file.starts_with(path)))
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.dir_exists(dir)? {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            ));
        }
        Ok(self
            .files
            .keys()
            .filter(|file| file.starts_with(dir))
            .cloned()
            .collect())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let file = self.get(path)?;
        Ok(Box::new(Cursor::new(file.contents.as_slice())))
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        Ok(self.get(path)?.mode)
    }
}
