//! Front-end facade over one working directory
//!
//! A [`Tracker`] owns the current repository state (the opened repository,
//! its status backend and the last changed-files scan), the status cache and
//! an operation lock. Refreshes and mutations are serialized through the
//! operation lock; queries only read the current state, which a refresh
//! swaps as a whole.
//!
//! Queries never fail: outside a repository they answer
//! [`FileStatus::NotControlled`] or nothing, and backend errors are logged
//! and replaced by the same defaults. The error is kept and exposed through
//! [`Tracker::last_error`] so a caller can retry or switch backends.
//! Mutations return their errors.

use crate::areas::repository::Repository;
use crate::artifacts::core::debounce::Debouncer;
use crate::artifacts::diff::patch::write_patch_file;
use crate::artifacts::status::cache::StatusCache;
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use crate::backend::{StatusBackend, open_backend};
use crate::commands::porcelain::commit::CommitOptions;
use crate::config::TrackerConfig;
use crate::errors::TrackerError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct RepoState {
    repository: Arc<Repository>,
    backend: Arc<dyn StatusBackend>,
    changed: Vec<GitFile>,
    generation: u64,
}

#[derive(Debug)]
pub struct Tracker {
    workdir: PathBuf,
    config: TrackerConfig,
    state: RwLock<Option<Arc<RepoState>>>,
    cache: StatusCache,
    generation: AtomicU64,
    last_error: RwLock<Option<Arc<anyhow::Error>>>,
    op_lock: tokio::sync::Mutex<()>,
    debouncer: Arc<Debouncer>,
}

impl Tracker {
    /// Bind a tracker to the repository containing `path`, or to `path`
    /// itself when no repository contains it, and load its state.
    pub async fn open(path: impl AsRef<Path>, config: TrackerConfig) -> Self {
        let path = path.as_ref();
        let workdir = Repository::discover(path)
            .or_else(|| path.canonicalize().ok())
            .unwrap_or_else(|| path.to_path_buf());

        let tracker = Tracker {
            debouncer: Arc::new(Debouncer::new(config.refresh_quiet_period)),
            workdir,
            config,
            state: RwLock::new(None),
            cache: StatusCache::default(),
            generation: AtomicU64::new(0),
            last_error: RwLock::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        };

        tracker.refresh().await;
        tracker
    }

    /// Nearest working directory at or above `path`
    pub fn find_repository_root(path: impl AsRef<Path>) -> Option<PathBuf> {
        Repository::discover(path.as_ref())
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether the last refresh found a repository
    pub fn is_controlled(&self) -> bool {
        self.state().is_some()
    }

    /// Name of the backend answering queries
    pub fn backend_name(&self) -> Option<&'static str> {
        self.state().map(|state| state.backend.name())
    }

    /// Reload the repository state and rescan the working tree.
    pub async fn refresh(&self) {
        let _guard = self.op_lock.lock().await;
        self.refresh_locked().await;
    }

    async fn refresh_locked(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut failure = None;

        let state = match self.open_repository().await {
            Ok(Some((repository, backend))) => {
                let changed = backend.changed_files().await.unwrap_or_else(|error| {
                    tracing::warn!(backend = backend.name(), %error, "changed-files scan failed");
                    failure = Some(error);
                    Vec::new()
                });

                tracing::debug!(
                    workdir = %self.workdir.display(),
                    backend = backend.name(),
                    changed = changed.len(),
                    generation,
                    "refreshed"
                );
                Some(Arc::new(RepoState {
                    repository,
                    backend,
                    changed,
                    generation,
                }))
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(workdir = %self.workdir.display(), %error, "refresh failed");
                failure = Some(error);
                None
            }
        };

        let changed = state.as_ref().map_or(&[][..], |state| state.changed.as_slice());
        self.cache.reset(generation, changed);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = failure.map(Arc::new);
    }

    async fn open_repository(
        &self,
    ) -> anyhow::Result<Option<(Arc<Repository>, Arc<dyn StatusBackend>)>> {
        let repository = match Repository::open(&self.workdir) {
            Ok(repository) => Arc::new(repository),
            Err(error)
                if matches!(
                    error.downcast_ref::<TrackerError>(),
                    Some(TrackerError::NotARepository { .. })
                ) =>
            {
                tracing::debug!(workdir = %self.workdir.display(), "not a repository");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        let backend = open_backend(repository.clone(), &self.config).await?;
        Ok(Some((repository, backend)))
    }

    /// The error behind the latest degraded answer: a failed refresh or scan,
    /// or a failed status or content query. A refresh that succeeds clears
    /// it. Native failures are told apart with
    /// [`TrackerError::is_native_failure`].
    pub fn last_error(&self) -> Option<Arc<anyhow::Error>> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_error(&self, error: anyhow::Error) {
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(error));
    }

    fn state(&self) -> Option<Arc<RepoState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_state(&self) -> anyhow::Result<Arc<RepoState>> {
        self.state().ok_or_else(|| {
            TrackerError::NotARepository {
                path: self.workdir.clone(),
            }
            .into()
        })
    }

    fn relative_path(state: &RepoState, path: &Path) -> anyhow::Result<String> {
        state
            .repository
            .relative_path(path)
            .ok_or_else(|| anyhow::anyhow!("{} is not inside the working tree", path.display()))
    }

    /// Status of `path` (absolute, or relative to the working directory)
    pub async fn file_status(&self, path: impl AsRef<Path>) -> FileStatus {
        let Some(state) = self.state() else {
            return FileStatus::NotControlled;
        };
        let Some(relative) = state.repository.relative_path(path.as_ref()) else {
            return FileStatus::NotControlled;
        };

        if let Some(status) = self.cache.get(&relative) {
            return status;
        }

        match state.backend.file_status(&relative).await {
            Ok(status) => {
                if !self.cache.put(state.generation, &relative, status) {
                    tracing::trace!(path = %relative, "status from a superseded refresh not cached");
                }
                status
            }
            Err(error) => {
                tracing::warn!(path = %relative, %error, "status query failed");
                self.record_error(error);
                FileStatus::NotControlled
            }
        }
    }

    /// Changed files found by the last refresh
    pub fn changed_files(&self) -> Vec<GitFile> {
        self.state()
            .map(|state| state.changed.clone())
            .unwrap_or_default()
    }

    /// Content of `path` in the last commit
    pub async fn file_content(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        let state = self.state()?;
        let relative = state.repository.relative_path(path.as_ref())?;

        state
            .backend
            .file_content(&relative)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(path = %relative, %error, "content query failed");
                self.record_error(error);
                None
            })
    }

    pub async fn stage_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let _guard = self.op_lock.lock().await;
        let state = self.require_state()?;
        let relative = Self::relative_path(&state, path.as_ref())?;

        state.repository.stage(&[relative.clone()]).await?;
        self.cache.invalidate(&relative);
        self.refresh_locked().await;
        Ok(())
    }

    pub async fn unstage_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let _guard = self.op_lock.lock().await;
        let state = self.require_state()?;
        let relative = Self::relative_path(&state, path.as_ref())?;

        state.repository.unstage(&[relative.clone()]).await?;
        self.cache.invalidate(&relative);
        self.refresh_locked().await;
        Ok(())
    }

    /// Commit the index; returns the short id of the new commit.
    pub async fn commit(&self, message: &str, options: CommitOptions) -> anyhow::Result<String> {
        let _guard = self.op_lock.lock().await;
        let state = self.require_state()?;

        let commit_id = state
            .repository
            .commit(message, options, &self.config.identity())
            .await?;
        self.refresh_locked().await;
        Ok(commit_id.to_short_oid())
    }

    /// Replace the last commit with the current index and `message`.
    pub async fn amend_commit(&self, message: &str) -> anyhow::Result<String> {
        self.commit(
            message,
            CommitOptions {
                amend: true,
                ..Default::default()
            },
        )
        .await
    }

    /// Discard working changes to `path`; a staged change is unstaged first.
    pub async fn check_out_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let _guard = self.op_lock.lock().await;
        let status = self.file_status(path.as_ref()).await;
        let state = self.require_state()?;
        let relative = Self::relative_path(&state, path.as_ref())?;

        if matches!(status, FileStatus::Staged | FileStatus::Removed) {
            state.repository.unstage(&[relative.clone()]).await?;
        }

        let repository = state.repository.clone();
        let target = relative.clone();
        tokio::task::spawn_blocking(move || repository.checkout_file(&target)).await??;

        self.cache.invalidate(&relative);
        self.refresh_locked().await;
        Ok(())
    }

    /// Switch to branch `name`, creating it at HEAD first with `create_new`.
    pub async fn check_out_branch(&self, name: &str, create_new: bool) -> anyhow::Result<()> {
        let _guard = self.op_lock.lock().await;
        let state = self.require_state()?;

        let result = state.repository.switch_branch(name, create_new).await;
        self.refresh_locked().await;
        result
    }

    pub fn current_branch(&self) -> Option<String> {
        let state = self.state()?;

        state
            .repository
            .refs()
            .current_branch()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "unable to read HEAD");
                None
            })
    }

    pub fn branches(&self) -> Vec<String> {
        let Some(state) = self.state() else {
            return Vec::new();
        };

        state
            .repository
            .refs()
            .list_branches()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "unable to list branches");
                Vec::new()
            })
    }

    pub fn last_commit_message(&self) -> Option<String> {
        let state = self.state()?;

        state
            .repository
            .last_commit_message()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "unable to read the last commit");
                None
            })
    }

    /// Write the patch of `path` against its committed content to a
    /// temporary file and return its location.
    pub async fn diff_file(&self, path: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let state = self.require_state()?;
        let relative = Self::relative_path(&state, path.as_ref())?;

        let patch = state.backend.diff_file(&relative).await?;
        write_patch_file(&patch)
    }

    /// Create a repository in the working directory unless one exists.
    pub async fn init(&self) -> anyhow::Result<()> {
        let _guard = self.op_lock.lock().await;

        let workdir = self.workdir.clone();
        tokio::task::spawn_blocking(move || Repository::init(&workdir)).await??;
        self.refresh_locked().await;
        Ok(())
    }

    /// Record a change in the working directory; a background refresh
    /// picks it up once changes have been quiet for a while.
    pub fn notify_change(&self) {
        self.debouncer.notify();
    }

    /// Poll for pending changes every `period` and refresh once they settle.
    /// Runs until the handle is aborted; once the tracker is dropped the
    /// ticks do nothing.
    pub fn spawn_background_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let tracker = Arc::downgrade(self);

        self.debouncer.clone().spawn_ticker(period, move || {
            let tracker = tracker.clone();
            async move {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.refresh().await;
                }
            }
        })
    }
}
