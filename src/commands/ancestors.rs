use std::path::{Path, PathBuf};

/// Directories from a starting point up to the filesystem root, nearest first.
///
/// Pure path manipulation: nothing is read from disk. A relative start only walks its own
/// components, so callers wanting every ancestor pass an absolute path.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<PathBuf>,
}

impl Ancestors {
    #[must_use]
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Ancestors {
            next: Some(start.into()),
        }
    }
}

fn parent_of(dir: &Path) -> Option<PathBuf> {
    dir.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

impl Iterator for Ancestors {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let current = self.next.take()?;
        self.next = parent_of(&current).filter(|parent| *parent != current);
        Some(current)
    }
}

/// Collect every ancestor of `start`, including `start` itself.
#[must_use]
pub fn ancestors(start: &Path) -> Vec<PathBuf> {
    Ancestors::new(start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_yields_only_itself() {
        assert_eq!(ancestors(Path::new("/")), vec![PathBuf::from("/")]);
    }

    #[test]
    fn test_absolute_path_walks_to_root() {
        assert_eq!(
            ancestors(Path::new("/p/q/r")),
            vec![
                PathBuf::from("/p/q/r"),
                PathBuf::from("/p/q"),
                PathBuf::from("/p"),
                PathBuf::from("/"),
            ]
        );
    }

    #[test]
    fn test_relative_path_never_walks_below_start() {
        assert_eq!(
            ancestors(Path::new("a/b")),
            vec![PathBuf::from("a/b"), PathBuf::from("a")]
        );
        assert_eq!(ancestors(Path::new(".")), vec![PathBuf::from(".")]);
        assert_eq!(ancestors(Path::new("..")), vec![PathBuf::from("..")]);
        assert_eq!(
            ancestors(Path::new("../a")),
            vec![PathBuf::from("../a"), PathBuf::from("..")]
        );
    }

    #[test]
    fn test_trailing_separator_is_ignored_by_parent() {
        let dirs = ancestors(Path::new("/p/q/"));
        assert_eq!(dirs.len(), 3);
        assert_eq!(dirs.last(), Some(&PathBuf::from("/")));
    }
}
