use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::fs::FileSystem;

/// Number of leading bytes inspected for binary detection
pub const BINARY_PROBE_LEN: usize = 512;
/// Upper bound on bytes read while looking for the first non-blank line
pub const SHEBANG_SCAN_LEN: usize = 4096;

const OWNER_EXECUTE: u32 = 0o100;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a candidate script looks like on disk. Recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileClassification {
    pub is_binary: bool,
    /// Interpreter line after `#!`, if the first non-blank line has one
    pub shebang: Option<String>,
    pub has_exec_permission: bool,
}

/// Inspect `path`: binary or text, shebang, owner-execute bit.
///
/// # Errors
///
/// Returns `ClassifyError::Io` if the file cannot be opened, read or statted.
pub fn classify(fs: &dyn FileSystem, path: &Path) -> Result<FileClassification, ClassifyError> {
    let io_err = |source| ClassifyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let classification = FileClassification {
        is_binary: is_binary_file(fs, path).map_err(io_err)?,
        shebang: read_shebang(fs, path).map_err(io_err)?,
        has_exec_permission: has_exec_permission(fs, path).map_err(io_err)?,
    };
    debug!("Classified {}: {classification:?}", path.display());
    Ok(classification)
}

/// True if the first [`BINARY_PROBE_LEN`] bytes look binary.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn is_binary_file(fs: &dyn FileSystem, path: &Path) -> io::Result<bool> {
    let mut head = Vec::with_capacity(BINARY_PROBE_LEN);
    fs.open(path)?
        .take(BINARY_PROBE_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(!is_text(&head))
}

/// Empty input is text. A NUL byte, or any control byte other than tab, newline or
/// carriage return, makes it binary.
#[must_use]
pub fn is_text(data: &[u8]) -> bool {
    data.iter()
        .all(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r'))
}

/// Shebang string of the first non-blank line, without the leading `#!`.
///
/// Only the first [`SHEBANG_SCAN_LEN`] bytes are scanned; a longer line is cut there.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_shebang(fs: &dyn FileSystem, path: &Path) -> io::Result<Option<String>> {
    let head = fs.open(path)?.take(SHEBANG_SCAN_LEN as u64);
    let line = first_non_blank_line(BufReader::new(head))?;
    Ok(line.and_then(|line| line.strip_prefix("#!").map(str::to_string)))
}

fn first_non_blank_line(mut reader: impl BufRead) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if !line.is_empty() {
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

/// Whether the owner-execute bit is set.
///
/// # Errors
///
/// Returns an error if the file cannot be statted.
pub fn has_exec_permission(fs: &dyn FileSystem, path: &Path) -> io::Result<bool> {
    Ok(fs.mode(path)? & OWNER_EXECUTE != 0)
}
