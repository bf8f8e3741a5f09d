use crate::areas::repository::Repository;
use crate::artifacts::diff::patch::unified_patch;
use crate::artifacts::status::file_status::{FileStatus, GitFile};
use crate::artifacts::status::porcelain;
use crate::backend::StatusBackend;
use crate::errors::TrackerError;
use async_trait::async_trait;
use bytes::Bytes;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Runner for an external `git` executable
#[derive(Debug, Clone)]
pub struct NativeGit {
    executable: PathBuf,
    utf8_file_names: bool,
    timeout: Duration,
}

impl NativeGit {
    pub fn new(executable: PathBuf, utf8_file_names: bool, timeout: Duration) -> Self {
        NativeGit {
            executable,
            utf8_file_names,
            timeout,
        }
    }

    pub fn utf8_file_names(&self) -> bool {
        self.utf8_file_names
    }

    /// Run `git -C <workdir> <args>` and return its stdout. Both pipes are
    /// drained before returning; a run past the timeout is killed.
    pub async fn run<I, S>(&self, workdir: &Path, args: I) -> anyhow::Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.executable);
        command
            .arg("--literal-pathspecs")
            .arg("-C")
            .arg(workdir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::trace!(workdir = %workdir.display(), "running git command: {:?}", command);

        let child = command.spawn().map_err(|error| match error.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                anyhow::Error::from(TrackerError::NativeGitUnavailable {
                    executable: self.executable.clone(),
                })
            }
            _ => anyhow::Error::from(error).context(format!(
                "Unable to start {}",
                self.executable.display()
            )),
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TrackerError::NativeGitTimedOut {
                seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TrackerError::NativeGitFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            }
            .into());
        }

        Ok(output.stdout)
    }
}

/// Backend that reads statuses from `git status --porcelain -z`
#[derive(Debug)]
pub struct NativeBackend {
    repository: Arc<Repository>,
    git: NativeGit,
}

impl NativeBackend {
    pub fn new(repository: Arc<Repository>, git: NativeGit) -> Self {
        NativeBackend { repository, git }
    }

    async fn status_records(
        &self,
        with_ignored: bool,
        path: Option<&str>,
    ) -> anyhow::Result<Vec<porcelain::PorcelainRecord>> {
        let mut args = vec![
            "--no-optional-locks",
            "status",
            "--porcelain",
            "-z",
            "--untracked-files=all",
            "--no-renames",
        ];
        if with_ignored {
            args.push("--ignored=matching");
        }
        if let Some(path) = path {
            args.extend(["--", path]);
        }

        let output = self.git.run(self.repository.path(), args).await?;
        Ok(porcelain::parse_records(&output, self.git.utf8_file_names()))
    }

    async fn is_listed(&self, path: &str) -> anyhow::Result<bool> {
        let output = self
            .git
            .run(self.repository.path(), ["ls-files", "-z", "--", path])
            .await?;

        Ok(output
            .split(|&byte| byte == 0)
            .any(|name| porcelain::decode_file_name(name, self.git.utf8_file_names()) == path))
    }
}

#[async_trait]
impl StatusBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn file_status(&self, path: &str) -> anyhow::Result<FileStatus> {
        let records = self.status_records(true, Some(path)).await?;
        if let Some(status) = porcelain::status_of(&records, path) {
            return Ok(status);
        }

        if self.is_listed(path).await? {
            Ok(FileStatus::Tracked)
        } else {
            Ok(FileStatus::NotControlled)
        }
    }

    async fn changed_files(&self) -> anyhow::Result<Vec<GitFile>> {
        let records = self.status_records(false, None).await?;

        Ok(porcelain::collapse(&records)
            .into_iter()
            .filter(|(_, status)| status.is_changed())
            .map(|(path, status)| GitFile::new(path, status))
            .collect())
    }

    async fn file_content(&self, path: &str) -> anyhow::Result<Option<Bytes>> {
        let spec = format!("HEAD:{path}");
        match self.git.run(self.repository.path(), ["show", spec.as_str()]).await {
            Ok(output) => Ok(Some(Bytes::from(output))),
            Err(error)
                if matches!(
                    error.downcast_ref::<TrackerError>(),
                    Some(TrackerError::NativeGitFailed { .. })
                ) =>
            {
                tracing::debug!(path = %path, "no committed content");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn diff_file(&self, path: &str) -> anyhow::Result<String> {
        match self
            .git
            .run(self.repository.path(), ["diff", "HEAD", "--", path])
            .await
        {
            Ok(output) => Ok(String::from_utf8_lossy(&output).into_owned()),
            Err(error)
                if matches!(
                    error.downcast_ref::<TrackerError>(),
                    Some(TrackerError::NativeGitFailed { .. })
                ) =>
            {
                tracing::debug!(path = %path, %error, "native diff failed, rendering in-process");
                let committed = self.repository.head_blob(path)?;
                let working = match self.repository.workspace().stat_file(path)? {
                    Some(stat) if !stat.mode.is_tree() => {
                        Some(self.repository.workspace().read_bytes(path)?)
                    }
                    _ => None,
                };

                Ok(unified_patch(path, committed.as_deref(), working.as_deref()))
            }
            Err(error) => Err(error),
        }
    }
}
