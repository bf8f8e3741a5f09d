//! Working directory access
//!
//! Paths handed to the workspace are normalized repository-relative paths
//! (`/`-separated). Nothing here follows symlinks: a link is reported and
//! hashed as a link, the way Git stores it.

use crate::artifacts::checkout::migration::{ActionType, Migration};
use crate::artifacts::core::repo_path::{self, GIT_DIR};
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::status::status_info::FileStatSet;
use anyhow::Context;
use bytes::Bytes;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn host_path(&self, relative: &str) -> PathBuf {
        repo_path::to_host_path(&self.path, relative)
    }

    /// Find the on-disk spelling of `relative`: the exact path when it
    /// exists, otherwise a case-insensitive match component by component.
    pub fn locate(&self, relative: &str) -> anyhow::Result<Option<String>> {
        if self.stat_file(relative)?.is_some() {
            return Ok(Some(relative.to_string()));
        }

        let mut located = Vec::new();
        for component in relative.split('/') {
            let parent = located.join("/");
            let candidate = if parent.is_empty() {
                component.to_string()
            } else {
                format!("{parent}/{component}")
            };

            if self.stat_file(&candidate)?.is_some() {
                located.push(component.to_string());
                continue;
            }

            let folded = component.to_lowercase();
            let matched = self
                .read_names(&parent)?
                .into_iter()
                .find(|name| name.to_lowercase() == folded);

            match matched {
                Some(name) => located.push(name),
                None => return Ok(None),
            }
        }

        Ok(Some(located.join("/")))
    }

    /// Stat data for `relative`, or `None` when nothing exists there
    pub fn stat_file(&self, relative: &str) -> anyhow::Result<Option<EntryMetadata>> {
        let path = self.host_path(relative);

        match std::fs::symlink_metadata(&path) {
            Ok(metadata) => Ok(Some(EntryMetadata::from_fs(&path, &metadata))),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(err) => {
                Err(err).with_context(|| format!("Unable to stat {}", path.display()))
            }
        }
    }

    /// Every file below the root keyed by relative path. `descend` decides
    /// whether a directory is entered; directories it rejects are reported
    /// with their own stat data instead.
    pub fn list_files(&self, mut descend: impl FnMut(&str) -> bool) -> anyhow::Result<FileStatSet> {
        let mut files = FileStatSet::new();
        let mut pruned = Vec::new();

        {
            let walker = WalkDir::new(&self.path)
                .min_depth(1)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    if entry.file_name() == GIT_DIR {
                        return false;
                    }
                    if !entry.file_type().is_dir() {
                        return true;
                    }

                    let Some(relative) = self.relative_of(entry.path()) else {
                        return false;
                    };
                    if descend(&relative) {
                        true
                    } else {
                        pruned.push(relative);
                        false
                    }
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unreadable working tree entry");
                        continue;
                    }
                };

                if entry.file_type().is_dir() {
                    continue;
                }

                if let Some(relative) = self.relative_of(entry.path()) {
                    let metadata = entry.metadata().with_context(|| {
                        format!("Unable to stat {}", entry.path().display())
                    })?;
                    files.insert(relative, EntryMetadata::from_fs(entry.path(), &metadata));
                }
            }
        }

        for relative in pruned {
            if let Some(stat) = self.stat_file(&relative)? {
                files.insert(relative, stat);
            }
        }

        Ok(files)
    }

    /// Direct children of a directory as relative paths
    pub fn list_dir(&self, relative: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .read_names(relative)?
            .into_iter()
            .map(|name| {
                if relative.is_empty() {
                    name
                } else {
                    format!("{relative}/{name}")
                }
            })
            .collect())
    }

    fn read_names(&self, relative: &str) -> anyhow::Result<Vec<String>> {
        let dir_path = self.host_path(relative);

        let entries = match std::fs::read_dir(&dir_path) {
            Ok(entries) => entries,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Unable to list {}", dir_path.display()));
            }
        };

        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != GIT_DIR)
            .collect())
    }

    fn relative_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.path).ok()?;
        let parts = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>();

        (!parts.is_empty()).then(|| parts.join("/"))
    }

    pub fn parse_blob(&self, relative: &str) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_bytes(relative)?))
    }

    /// Raw content; for a symlink, the link target
    pub fn read_bytes(&self, relative: &str) -> anyhow::Result<Bytes> {
        let path = self.host_path(relative);
        let metadata = std::fs::symlink_metadata(&path)
            .with_context(|| format!("Unable to stat {}", path.display()))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&path)
                .with_context(|| format!("Unable to read link {}", path.display()))?;
            let target = target.to_string_lossy().replace('\\', "/");
            return Ok(Bytes::from(target.into_bytes()));
        }

        let content = std::fs::read(&path)
            .with_context(|| format!("Unable to read file {}", path.display()))?;
        Ok(Bytes::from(content))
    }

    /// Replace whatever is at `relative` with a file holding `data`.
    pub fn write_file(&self, relative: &str, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        let path = self.host_path(relative);

        for parent in repo_path::parent_dirs(relative) {
            self.make_directory(parent)?;
        }
        self.remove_file(relative)?;

        if mode == EntryMode::Symlink {
            return self.write_symlink(&path, data);
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Unable to open file {}", path.display()))?;
        file.write_all(data)
            .with_context(|| format!("Unable to write file {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = match mode {
                EntryMode::File(FileMode::Executable) => 0o755,
                _ => 0o644,
            };
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(permissions))
                .with_context(|| format!("Unable to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    #[cfg(unix)]
    fn write_symlink(&self, path: &Path, target: &[u8]) -> anyhow::Result<()> {
        let target = String::from_utf8_lossy(target).into_owned();
        std::os::unix::fs::symlink(&target, path)
            .with_context(|| format!("Unable to create link {}", path.display()))
    }

    #[cfg(not(unix))]
    fn write_symlink(&self, path: &Path, target: &[u8]) -> anyhow::Result<()> {
        std::fs::write(path, target)
            .with_context(|| format!("Unable to write link file {}", path.display()))
    }

    /// Remove the file or directory at `relative`, if any
    pub fn remove_file(&self, relative: &str) -> anyhow::Result<()> {
        let path = self.host_path(relative);

        let result = match std::fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(&path),
            Ok(_) => std::fs::remove_file(&path),
            Err(_) => return Ok(()),
        };

        result.with_context(|| format!("Unable to remove {}", path.display()))
    }

    /// Apply a planned checkout. Deletions go first and emptied directories
    /// are removed deepest first; then directories are created parents
    /// first, and changed and added files are written.
    pub fn apply_migration(&self, migration: &Migration) -> anyhow::Result<()> {
        self.apply_migration_action_set(migration, ActionType::Delete)?;

        for dir in migration.rmdirs().iter().rev() {
            self.remove_directory(dir)?;
        }

        for dir in migration.mkdirs() {
            self.make_directory(dir)?;
        }

        self.apply_migration_action_set(migration, ActionType::Modify)?;
        self.apply_migration_action_set(migration, ActionType::Add)
    }

    fn apply_migration_action_set(
        &self,
        migration: &Migration,
        action: ActionType,
    ) -> anyhow::Result<()> {
        let Some(actions) = migration.actions().get(&action) else {
            return Ok(());
        };

        for (path, entry) in actions {
            match (action, entry) {
                (ActionType::Delete, _) => self.remove_file(path)?,
                (ActionType::Add | ActionType::Modify, Some(entry)) => {
                    let data = migration.load_blob_data(&entry.oid)?;
                    self.write_file(path, &data, entry.mode)?;
                }
                (_, None) => {
                    return Err(anyhow::anyhow!("Missing target entry for {path}"));
                }
            }
        }

        Ok(())
    }

    /// Remove an emptied directory; one still holding files stays.
    fn remove_directory(&self, relative: &str) -> anyhow::Result<()> {
        let path = self.host_path(relative);

        match std::fs::remove_dir(&path) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::DirectoryNotEmpty
                ) =>
            {
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("Unable to remove {}", path.display())),
        }
    }

    fn make_directory(&self, relative: &str) -> anyhow::Result<()> {
        let path = self.host_path(relative);

        match std::fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => return Ok(()),
            Ok(_) => std::fs::remove_file(&path)
                .with_context(|| format!("Unable to remove {}", path.display()))?,
            Err(_) => {}
        }

        std::fs::create_dir(&path)
            .with_context(|| format!("Unable to create directory {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "lib").unwrap();
        std::fs::write(dir.path().join("src/nested/Mod.rs"), "mod").unwrap();
        std::fs::write(dir.path().join("target/debug/app"), "app").unwrap();

        let workspace = Workspace::new(dir.path().into());
        (dir, workspace)
    }

    #[rstest]
    fn lists_files_skipping_git_and_pruned_directories(workspace: (tempfile::TempDir, Workspace)) {
        let (_dir, workspace) = workspace;
        let files = workspace.list_files(|dir| dir != "target").unwrap();

        assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec!["README.md", "src/lib.rs", "src/nested/Mod.rs", "target"]
        );
        assert!(files["target"].mode.is_tree());
    }

    #[rstest]
    fn locates_paths_case_insensitively(workspace: (tempfile::TempDir, Workspace)) {
        let (_dir, workspace) = workspace;

        assert_eq!(workspace.locate("src/lib.rs").unwrap().as_deref(), Some("src/lib.rs"));
        assert_eq!(
            workspace.locate("SRC/Nested/mod.RS").unwrap().as_deref(),
            Some("src/nested/Mod.rs")
        );
        assert_eq!(workspace.locate("src/missing.rs").unwrap(), None);
    }

    #[rstest]
    fn stat_of_a_path_below_a_file_is_none(workspace: (tempfile::TempDir, Workspace)) {
        let (_dir, workspace) = workspace;

        assert!(workspace.stat_file("README.md/child").unwrap().is_none());
        assert!(workspace.stat_file("README.md").unwrap().is_some());
    }

    #[rstest]
    fn write_file_replaces_directories_and_creates_parents(
        workspace: (tempfile::TempDir, Workspace),
    ) {
        let (_dir, workspace) = workspace;

        workspace
            .write_file("src/nested", b"now a file", EntryMode::File(FileMode::Regular))
            .unwrap();
        workspace
            .write_file("docs/guide/intro.md", b"intro", EntryMode::File(FileMode::Regular))
            .unwrap();

        assert_eq!(workspace.read_bytes("src/nested").unwrap(), Bytes::from_static(b"now a file"));
        assert_eq!(workspace.read_bytes("docs/guide/intro.md").unwrap(), Bytes::from_static(b"intro"));
    }

    #[cfg(unix)]
    #[rstest]
    fn symlinks_read_as_their_target(workspace: (tempfile::TempDir, Workspace)) {
        let (dir, workspace) = workspace;
        std::os::unix::fs::symlink("src/lib.rs", dir.path().join("link")).unwrap();

        assert_eq!(workspace.read_bytes("link").unwrap(), Bytes::from_static(b"src/lib.rs"));
        assert_eq!(workspace.stat_file("link").unwrap().unwrap().mode, EntryMode::Symlink);
    }
}
