//! Lexical path normalization.
//!
//! Walked entries are always `root.join(..)`, so roots and protected paths
//! must be compared in the same absolute, `..`-free form. Nothing here touches
//! the filesystem beyond reading the current directory; symlinks are not
//! resolved.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory and fold away `.`
/// and `..` components.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Make `path` absolute against `base` instead of the current directory.
pub fn absolutize_from(base: &Path, path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        absolutize(&base.join(path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` stays at `/`
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_is_normalized() {
        let path = absolutize(Path::new("/data/./downloads/../uploads/a.pdf")).unwrap();
        assert_eq!(path, PathBuf::from("/data/uploads/a.pdf"));
    }

    #[test]
    fn test_parent_of_root_stays_root() {
        let path = absolutize(Path::new("/../../tmp")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_relative_path_uses_current_dir() {
        let cwd = std::env::current_dir().unwrap();
        let path = absolutize(Path::new("downloads/a.mp4")).unwrap();
        assert_eq!(path, cwd.join("downloads").join("a.mp4"));
    }

    #[test]
    fn test_absolutize_from_base() {
        let path = absolutize_from(Path::new("/run/app"), Path::new("../data/x.bin")).unwrap();
        assert_eq!(path, PathBuf::from("/run/data/x.bin"));

        let path = absolutize_from(Path::new("/run/app"), Path::new("/abs/y.bin")).unwrap();
        assert_eq!(path, PathBuf::from("/abs/y.bin"));
    }
}
