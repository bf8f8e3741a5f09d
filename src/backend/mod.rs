//! Status backends
//!
//! Both backends answer the same read-only queries over one working tree:
//!
//! - `object_db`: reads the object database, the index and the working
//!   directory in-process
//! - `native`: runs a `git` executable and decodes its porcelain output
//!
//! Mutations never go through a backend; they always run in-process against
//! the [`Repository`].

pub mod native;
pub mod object_db;

use crate::areas::repository::Repository;
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use crate::config::TrackerConfig;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

#[async_trait]
pub trait StatusBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Status of one normalized path
    async fn file_status(&self, path: &str) -> anyhow::Result<FileStatus>;

    /// Every path whose status is worth showing, in path order
    async fn changed_files(&self) -> anyhow::Result<Vec<GitFile>>;

    /// Committed content of `path`; `None` when HEAD does not have it
    async fn file_content(&self, path: &str) -> anyhow::Result<Option<Bytes>>;

    /// Unified patch of the committed content against the working copy
    async fn diff_file(&self, path: &str) -> anyhow::Result<String>;
}

/// Build the backend `config` selects for `repository`.
pub async fn open_backend(
    repository: Arc<Repository>,
    config: &TrackerConfig,
) -> anyhow::Result<Arc<dyn StatusBackend>> {
    let backend: Arc<dyn StatusBackend> = match &config.git_executable {
        Some(executable) => Arc::new(native::NativeBackend::new(
            repository,
            native::NativeGit::new(
                executable.clone(),
                config.utf8_file_names,
                config.native_timeout,
            ),
        )),
        None => Arc::new(object_db::ObjectDbBackend::load(repository).await?),
    };

    tracing::debug!(backend = backend.name(), "opened status backend");
    Ok(backend)
}
