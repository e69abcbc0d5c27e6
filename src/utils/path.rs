//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `expand_path` - user-supplied config paths (`~`, relative to a base)
//! - `clean_relative` - lexical `.`/`..` resolution that never climbs above its root
//! - `is_plain_file_name` - a name that stays inside the directory it is joined to

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Expand `~` and resolve a relative path against `base`.
pub fn expand_path(raw: &Path, base: &Path) -> PathBuf {
    let raw_str = raw.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(&raw_str).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Resolve `.` and `..` segments of a relative path without touching disk.
///
/// Returns `None` when the path would climb above its starting point or
/// carries a root/prefix component (an absolute path smuggled in).
pub fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().collect())
}

/// Whether `name` is exactly one normal path component (no separators,
/// no `.`/`..`, not empty).
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_expand_path_relative_to_base() {
        let expanded = expand_path(Path::new("Library.library"), Path::new("/home/me"));
        assert_eq!(expanded, PathBuf::from("/home/me/Library.library"));
    }

    #[test]
    fn test_expand_path_absolute_kept() {
        let expanded = expand_path(Path::new("/data/lib"), Path::new("/home/me"));
        assert_eq!(expanded, PathBuf::from("/data/lib"));
    }

    #[test]
    fn test_clean_relative() {
        assert_eq!(
            clean_relative(Path::new("images/./a.info/../b.info")),
            Some(PathBuf::from("images/b.info"))
        );
        assert_eq!(clean_relative(Path::new("images/../../etc/passwd")), None);
        assert_eq!(clean_relative(Path::new("../x")), None);
        assert_eq!(clean_relative(Path::new("/etc/passwd")), None);
        assert_eq!(clean_relative(Path::new("")), Some(PathBuf::new()));
    }

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("cat.png"));
        assert!(is_plain_file_name("ABC123.info"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../../moved"));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name("/etc"));
        assert!(!is_plain_file_name("cat/"));
    }
}
