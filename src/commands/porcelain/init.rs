use crate::areas::repository::Repository;
use crate::artifacts::core::repo_path::GIT_DIR;
use anyhow::Context;
use std::fs;
use std::path::Path;

const DEFAULT_BRANCH: &str = "master";

const DEFAULT_CONFIG: &str = "[core]\n\
\trepositoryformatversion = 0\n\
\tfilemode = true\n\
\tbare = false\n";

impl Repository {
    /// Create the `.git` layout under `workdir` and open it. An existing
    /// repository is opened untouched.
    pub fn init(workdir: &Path) -> anyhow::Result<Self> {
        let git_dir = workdir.join(GIT_DIR);

        if git_dir.is_dir() {
            tracing::debug!(workdir = %workdir.display(), "repository already initialized");
            return Self::open(workdir);
        }

        fs::create_dir_all(git_dir.join("objects"))
            .context("Failed to create .git/objects directory")?;
        fs::create_dir_all(git_dir.join("refs").join("heads"))
            .context("Failed to create .git/refs/heads directory")?;
        fs::create_dir_all(git_dir.join("refs").join("tags"))
            .context("Failed to create .git/refs/tags directory")?;

        fs::write(
            git_dir.join("HEAD"),
            format!("ref: refs/heads/{DEFAULT_BRANCH}\n"),
        )
        .context("Failed to create initial HEAD reference")?;
        fs::write(git_dir.join("config"), DEFAULT_CONFIG)
            .context("Failed to write .git/config")?;

        tracing::info!(workdir = %workdir.display(), "initialized empty repository");
        Self::open(workdir)
    }
}
