//! Root `.gitignore` rules
//!
//! Patterns come from the `.gitignore` at the working-directory root only.
//! Negated patterns are not supported and are skipped; a path is ignored when
//! any remaining pattern matches it or one of its parent directories.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

pub const IGNORE_FILE: &str = ".gitignore";

#[derive(Debug, Clone)]
pub struct IgnoreRules {
    matcher: Gitignore,
    patterns: usize,
}

impl IgnoreRules {
    pub fn empty() -> Self {
        IgnoreRules {
            matcher: Gitignore::empty(),
            patterns: 0,
        }
    }

    /// Load the root ignore file of `workdir`. A missing, unreadable or
    /// malformed file yields an empty rule set.
    pub fn load(workdir: &Path) -> Self {
        let ignore_path = workdir.join(IGNORE_FILE);

        let content = match std::fs::read(&ignore_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::empty(),
            Err(err) => {
                tracing::warn!(path = %ignore_path.display(), error = %err, "unable to read ignore file");
                return Self::empty();
            }
        };

        Self::parse(workdir, &String::from_utf8_lossy(&content), ignore_path)
    }

    fn parse(workdir: &Path, content: &str, source: PathBuf) -> Self {
        let mut builder = GitignoreBuilder::new(workdir);
        let mut patterns = 0;

        for line in content.lines() {
            let pattern = line.trim_end();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }

            if pattern.starts_with('!') {
                tracing::debug!(pattern = %pattern, "negated ignore pattern skipped");
                continue;
            }

            match builder.add_line(Some(source.clone()), pattern) {
                Ok(_) => patterns += 1,
                Err(err) => tracing::warn!(pattern = %pattern, error = %err, "invalid ignore pattern"),
            }
        }

        match builder.build() {
            Ok(matcher) => IgnoreRules { matcher, patterns },
            Err(err) => {
                tracing::warn!(path = %source.display(), error = %err, "unable to build ignore rules");
                Self::empty()
            }
        }
    }

    /// Whether the normalized `path` or one of its parents is ignored
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        if self.patterns == 0 || path.is_empty() {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(Path::new(path), is_dir)
            .is_ignore()
    }

    pub fn len(&self) -> usize {
        self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns == 0
    }
}
