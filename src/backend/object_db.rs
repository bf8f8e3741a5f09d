use crate::areas::repository::Repository;
use crate::artifacts::diff::patch::unified_patch;
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use crate::artifacts::status::status_info::StatusSnapshot;
use crate::backend::StatusBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// In-process backend over a snapshot taken when it was loaded
#[derive(Debug)]
pub struct ObjectDbBackend {
    repository: Arc<Repository>,
    snapshot: Arc<StatusSnapshot>,
}

impl ObjectDbBackend {
    /// Load HEAD's tree, the index and the ignore rules off the async
    /// executor.
    pub async fn load(repository: Arc<Repository>) -> anyhow::Result<Self> {
        let snapshot = {
            let repository = repository.clone();
            tokio::task::spawn_blocking(move || repository.snapshot()).await??
        };

        Ok(ObjectDbBackend {
            repository,
            snapshot: Arc::new(snapshot),
        })
    }

    async fn blocking<T, F>(&self, task: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository, &StatusSnapshot) -> anyhow::Result<T> + Send + 'static,
    {
        let repository = self.repository.clone();
        let snapshot = self.snapshot.clone();

        tokio::task::spawn_blocking(move || task(&repository, &snapshot)).await?
    }
}

#[async_trait]
impl StatusBackend for ObjectDbBackend {
    fn name(&self) -> &'static str {
        "object-db"
    }

    async fn file_status(&self, path: &str) -> anyhow::Result<FileStatus> {
        let path = path.to_string();
        self.blocking(move |_, snapshot| snapshot.resolve(&path))
            .await
    }

    async fn changed_files(&self) -> anyhow::Result<Vec<GitFile>> {
        self.blocking(|_, snapshot| snapshot.resolve_all()).await
    }

    async fn file_content(&self, path: &str) -> anyhow::Result<Option<Bytes>> {
        let path = path.to_string();
        self.blocking(move |repository, snapshot| committed_content(repository, snapshot, &path))
            .await
    }

    async fn diff_file(&self, path: &str) -> anyhow::Result<String> {
        let path = path.to_string();
        self.blocking(move |repository, snapshot| {
            let committed = committed_content(repository, snapshot, &path)?;
            let working = match repository.workspace().locate(&path)? {
                Some(working_path) if !is_directory(repository, &working_path)? => {
                    Some(repository.workspace().read_bytes(&working_path)?)
                }
                _ => None,
            };

            Ok(unified_patch(&path, committed.as_deref(), working.as_deref()))
        })
        .await
    }
}

fn committed_content(
    repository: &Repository,
    snapshot: &StatusSnapshot,
    path: &str,
) -> anyhow::Result<Option<Bytes>> {
    let Some(entry) = snapshot
        .tracked_name(path)
        .and_then(|name| snapshot.head_tree().get(name))
    else {
        return Ok(None);
    };

    Ok(Some(repository.database().load_blob(&entry.oid)?))
}

fn is_directory(repository: &Repository, path: &str) -> anyhow::Result<bool> {
    Ok(repository
        .workspace()
        .stat_file(path)?
        .is_some_and(|stat| stat.mode.is_tree()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::porcelain::commit::CommitOptions;
    use crate::config::Identity;
    use pretty_assertions::assert_eq;
    use std::fs;

    async fn repository_with_commit(dir: &std::path::Path) -> Arc<Repository> {
        let repository = Repository::init(dir).unwrap();
        fs::write(dir.join("notes.txt"), "first line\n").unwrap();
        repository.stage(&["notes.txt".to_string()]).await.unwrap();
        repository
            .commit(
                "initial",
                CommitOptions::default(),
                &Identity::new("Test".to_string(), "test@example.com".to_string()),
            )
            .await
            .unwrap();
        Arc::new(repository)
    }

    #[tokio::test]
    async fn content_comes_from_the_last_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repository = repository_with_commit(dir.path()).await;
        fs::write(dir.path().join("notes.txt"), "edited\n").unwrap();

        let backend = ObjectDbBackend::load(repository).await.unwrap();

        assert_eq!(
            backend.file_content("notes.txt").await.unwrap().as_deref(),
            Some(b"first line\n".as_slice())
        );
        assert_eq!(backend.file_content("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn diff_shows_working_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repository = repository_with_commit(dir.path()).await;
        fs::write(dir.path().join("notes.txt"), "second line\n").unwrap();

        let backend = ObjectDbBackend::load(repository).await.unwrap();
        let patch = backend.diff_file("notes.txt").await.unwrap();

        assert!(patch.contains("-first line"));
        assert!(patch.contains("+second line"));
    }

    #[tokio::test]
    async fn changed_files_lists_untracked_and_modified() {
        let dir = tempfile::tempdir().unwrap();
        let repository = repository_with_commit(dir.path()).await;
        fs::write(dir.path().join("notes.txt"), "different length\n").unwrap();
        fs::write(dir.path().join("new.txt"), "new\n").unwrap();

        let backend = ObjectDbBackend::load(repository).await.unwrap();
        let changed = backend.changed_files().await.unwrap();

        assert_eq!(
            changed,
            vec![
                GitFile::new("new.txt".to_string(), FileStatus::New),
                GitFile::new("notes.txt".to_string(), FileStatus::Modified),
            ]
        );
    }
}
