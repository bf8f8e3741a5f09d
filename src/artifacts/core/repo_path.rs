//! Repository-relative path normalization
//!
//! Every path crossing the tracker's boundary is turned into the form Git
//! stores in trees and the index: relative to the working directory, with `/`
//! separators and no `.`/`..` components. Backslashes are treated as
//! separators on every host.

use std::path::{Component, Path, PathBuf};

/// Name of the repository metadata directory
pub const GIT_DIR: &str = ".git";

/// Normalize `path` (absolute, or relative to `workdir`) into a
/// repository-relative, forward-slash path.
///
/// Returns `None` for the working directory itself, for paths outside of it
/// and for paths inside `.git`.
pub fn normalize(workdir: &Path, path: &Path) -> Option<String> {
    let path = PathBuf::from(path.to_string_lossy().replace('\\', "/"));

    let relative = if path.is_absolute() {
        strip_workdir(workdir, &path)?
    } else {
        path
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    match parts.first() {
        None => None,
        Some(first) if first == GIT_DIR => None,
        Some(_) => Some(parts.join("/")),
    }
}

/// Key under which a normalized path is cached: working directories may be
/// case-insensitive while Git is not, so the key folds case.
pub fn cache_key(relative: &str) -> String {
    relative.to_lowercase()
}

/// Turn a normalized path back into a host path under `workdir`.
pub fn to_host_path(workdir: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(workdir.to_path_buf(), |acc, part| acc.join(part))
}

/// Parent directories of a normalized path, outermost first
/// (`a/b/c` yields `a` and `a/b`).
pub fn parent_dirs(relative: &str) -> Vec<&str> {
    relative
        .match_indices('/')
        .map(|(idx, _)| &relative[..idx])
        .collect()
}

/// Last component of a normalized path.
pub fn basename(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

fn strip_workdir(workdir: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(workdir) {
        return Some(relative.to_path_buf());
    }

    let canonical_workdir = canonicalize_lossy(workdir);
    let canonical_path = canonicalize_lossy(path);
    if let Ok(relative) = canonical_path.strip_prefix(&canonical_workdir) {
        return Some(relative.to_path_buf());
    }

    // case-insensitive volumes: compare the folded textual forms
    let workdir_text = fold(&canonical_workdir);
    let path_text = fold(&canonical_path);
    let rest = path_text.strip_prefix(&workdir_text)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let original = canonical_path.to_string_lossy().replace('\\', "/");
    Some(PathBuf::from(
        original[original.len() - rest.len()..].trim_start_matches('/'),
    ))
}

fn fold(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_lowercase()
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn canonicalize_lossy(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;

    loop {
        if let Ok(canonical) = current.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;
    use rstest::rstest;

    #[rstest]
    #[case("a.txt", Some("a.txt"))]
    #[case("./dir/a.txt", Some("dir/a.txt"))]
    #[case("dir\\sub\\a.txt", Some("dir/sub/a.txt"))]
    #[case("dir/../b.txt", Some("b.txt"))]
    #[case("../outside.txt", None)]
    #[case(".", None)]
    #[case(".git/index", None)]
    fn normalizes_relative_paths(#[case] input: &str, #[case] expected: Option<&str>) {
        let workdir = Path::new("/repo");

        assert_eq!(
            normalize(workdir, Path::new(input)),
            expected.map(String::from)
        );
    }

    #[test]
    fn strips_working_directory_from_absolute_paths() {
        let workdir = std::env::temp_dir();
        let absolute = workdir.join("nested").join("file.rs");

        assert_eq!(
            normalize(&workdir, &absolute),
            Some("nested/file.rs".to_string())
        );
    }

    #[test]
    fn rejects_absolute_paths_outside_the_working_directory() {
        let workdir = std::env::temp_dir().join("gtrack-repo-root");
        let outside = std::env::temp_dir().join("gtrack-elsewhere").join("file.rs");

        assert_eq!(normalize(&workdir, &outside), None);
    }

    #[test]
    fn parent_dirs_are_listed_outermost_first() {
        assert_eq!(parent_dirs("a/b/c.txt"), vec!["a", "a/b"]);
        assert_eq!(parent_dirs("c.txt"), Vec::<&str>::new());
    }

    #[test]
    fn host_path_round_trips_through_normalize() {
        let workdir = Path::new("/repo");
        let host = to_host_path(workdir, "a/b/c.txt");

        assert_eq!(host, Path::new("/repo").join("a").join("b").join("c.txt"));
        assert_eq!(normalize(workdir, &host), Some("a/b/c.txt".to_string()));
    }

    proptest! {
        #[test]
        fn joined_segments_normalize_to_slash_form(
            segments in proptest::collection::vec("[a-zA-Z0-9_-]{1,8}", 1..5)
        ) {
            let workdir = Path::new("/repo");
            let relative = segments.join("/");
            let host = to_host_path(workdir, &relative);

            proptest::prop_assert_eq!(normalize(workdir, &host), Some(relative));
        }

        #[test]
        fn cache_key_is_case_insensitive(name in "[a-zA-Z]{1,12}") {
            proptest::prop_assert_eq!(cache_key(&name.to_uppercase()), cache_key(&name.to_lowercase()));
        }
    }
}
