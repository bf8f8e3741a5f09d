use assert_cmd::Command;
use assert_fs::TempDir;
use gtrack::{Identity, Tracker, TrackerConfig};
use rstest::fixture;
use std::path::Path;

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

pub fn identity() -> Identity {
    Identity::new(AUTHOR_NAME.to_string(), AUTHOR_EMAIL.to_string())
}

pub fn in_process_config() -> TrackerConfig {
    TrackerConfig::default().with_identity(identity())
}

pub fn native_config(git: &Path) -> TrackerConfig {
    in_process_config().with_git_executable(git)
}

/// A tracker over a freshly initialized repository.
pub async fn init_tracker(dir: &Path, config: TrackerConfig) -> Tracker {
    let tracker = Tracker::open(dir, config).await;
    tracker.init().await.expect("Failed to initialize repository");
    tracker
}

pub fn run_gtrack_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("gtrack").expect("Failed to find gtrack binary");
    cmd.env_remove("GTRACK_GIT");
    cmd.envs([
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
    ]);
    cmd.current_dir(dir);
    cmd.args(args);
    cmd
}

/// `git` with a fixed identity and no user or system configuration.
pub fn run_git_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    cmd.envs([
        ("GIT_CONFIG_NOSYSTEM", "1"),
        ("GIT_CONFIG_GLOBAL", "/dev/null"),
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("GIT_COMMITTER_NAME", AUTHOR_NAME),
        ("GIT_COMMITTER_EMAIL", AUTHOR_EMAIL),
    ]);
    cmd.args(args);
    cmd
}

pub fn git(dir: &Path, args: &[&str]) {
    run_git_command(dir, args).assert().success();
}
