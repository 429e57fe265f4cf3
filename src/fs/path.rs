//! Path arithmetic shared by the sidebar, the search filter and the hand-off.

use std::path::{Path, PathBuf};

/// Express `path` relative to `base`.
///
/// Returns `.` when both are equal and the absolute path when `path` is not
/// inside `base`.
pub fn relative_path(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

/// Quote `s` so a POSIX shell reads it back as a single word, unchanged.
///
/// Safe strings are returned bare. Everything else is wrapped in single
/// quotes, with each embedded `'` written as `'"'"'`.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_shell_safe) {
        return s.to_string();
    }
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if c == '\'' {
            quoted.push_str("'\"'\"'");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Ancestors of `path`, nearest first, down to and including `root`.
///
/// `ancestors_of(root, root)` is empty, and so is the result for a path
/// outside `root`.
pub fn ancestors_of(path: &Path, root: &Path) -> Vec<PathBuf> {
    if !path.starts_with(root) {
        return Vec::new();
    }
    path.ancestors()
        .skip(1)
        .take_while(|p| p.starts_with(root))
        .map(Path::to_path_buf)
        .collect()
}

/// The path with its last segment trimmed; `None` at the filesystem root.
pub fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_inside_base() {
        assert_eq!(
            relative_path(Path::new("/proj/src/a.txt"), Path::new("/proj")),
            "src/a.txt"
        );
    }

    #[test]
    fn relative_path_of_base_is_dot() {
        assert_eq!(relative_path(Path::new("/proj"), Path::new("/proj")), ".");
    }

    #[test]
    fn relative_path_outside_base_stays_absolute() {
        assert_eq!(
            relative_path(Path::new("/other/file.rs"), Path::new("/proj")),
            "/other/file.rs"
        );
    }

    #[test]
    fn relative_path_respects_segment_boundaries() {
        // "/project" is not inside "/proj"
        assert_eq!(
            relative_path(Path::new("/project/a"), Path::new("/proj")),
            "/project/a"
        );
    }

    #[test]
    fn quote_leaves_safe_strings_bare() {
        assert_eq!(shell_quote("src/a.txt"), "src/a.txt");
        assert_eq!(shell_quote("."), ".");
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's.txt"), "'it'\"'\"'s.txt'");
    }

    #[test]
    fn quote_wraps_spaces_and_metacharacters() {
        assert_eq!(shell_quote("my file.txt"), "'my file.txt'");
        assert_eq!(shell_quote("$(rm -rf)"), "'$(rm -rf)'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn ancestors_walk_up_to_root() {
        assert_eq!(
            ancestors_of(Path::new("/a/b/c"), Path::new("/a")),
            vec![PathBuf::from("/a/b"), PathBuf::from("/a")]
        );
    }

    #[test]
    fn ancestors_of_root_is_empty() {
        assert!(ancestors_of(Path::new("/a"), Path::new("/a")).is_empty());
    }

    #[test]
    fn ancestors_outside_root_is_empty() {
        assert!(ancestors_of(Path::new("/x/y"), Path::new("/a")).is_empty());
    }

    #[test]
    fn parent_trims_last_segment() {
        assert_eq!(parent_of(Path::new("/a/b")), Some(PathBuf::from("/a")));
        assert_eq!(parent_of(Path::new("/")), None);
    }
}
