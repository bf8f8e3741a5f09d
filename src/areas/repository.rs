use crate::areas::database::Database;
use crate::areas::ignore::IgnoreRules;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::repo_path::{self, GIT_DIR};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::status_info::{HeadTree, StatusSnapshot};
use crate::errors::TrackerError;
use anyhow::Context;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An opened repository rooted at a working directory
///
/// The index sits behind an async mutex: every mutation holds it from
/// rehydrate to write-back.
#[derive(Debug)]
pub struct Repository {
    path: Box<Path>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open the repository whose working directory is `workdir`.
    pub fn open(workdir: &Path) -> anyhow::Result<Self> {
        let path = workdir
            .canonicalize()
            .with_context(|| format!("Unable to resolve {}", workdir.display()))?;
        let git_dir = path.join(GIT_DIR);

        if !git_dir.is_dir() {
            return Err(TrackerError::NotARepository { path }.into());
        }

        Ok(Repository {
            index: Arc::new(Mutex::new(Index::new(
                git_dir.join("index").into_boxed_path(),
            ))),
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(git_dir.into_boxed_path()),
            path: path.into_boxed_path(),
        })
    }

    /// Nearest directory at or above `path` holding a `.git` directory
    pub fn discover(path: &Path) -> Option<PathBuf> {
        let start = path.canonicalize().ok()?;

        start
            .ancestors()
            .find(|candidate| candidate.join(GIT_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Normalize a caller path against this working directory.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        repo_path::normalize(&self.path, path)
    }

    pub fn head_oid(&self) -> anyhow::Result<Option<ObjectId>> {
        self.refs.read_head()
    }

    /// The flattened tree of the HEAD commit; empty on an unborn branch
    pub fn head_tree(&self) -> anyhow::Result<HeadTree> {
        let head = self.refs.read_head()?;
        self.database.load_tree_list(head.as_ref())
    }

    /// Content of `relative` as committed in HEAD
    pub fn head_blob(&self, relative: &str) -> anyhow::Result<Option<Bytes>> {
        match self.head_tree()?.get(relative) {
            Some(entry) => Ok(Some(self.database.load_blob(&entry.oid)?)),
            None => Ok(None),
        }
    }

    /// Freeze HEAD's tree, the index and the ignore rules for status queries.
    ///
    /// Blocks on the index lock, so it must run off the async executor.
    pub fn snapshot(&self) -> anyhow::Result<StatusSnapshot> {
        let index = {
            let mut index = self.index.blocking_lock();
            index.rehydrate()?;
            index.clone()
        };

        let head_tree = self.head_tree()?;
        let ignore_rules = IgnoreRules::load(&self.path);

        tracing::debug!(
            workdir = %self.path.display(),
            tracked = head_tree.len(),
            ignore_patterns = ignore_rules.len(),
            "loaded repository state"
        );

        Ok(StatusSnapshot::new(
            self.workspace.clone(),
            head_tree,
            index,
            ignore_rules,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn opening_a_plain_directory_fails_with_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let error = Repository::open(dir.path()).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotARepository { .. })
        ));
    }

    #[test]
    fn discovery_walks_up_to_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();

        let root = Repository::discover(&dir.path().join("a/b")).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }
}
