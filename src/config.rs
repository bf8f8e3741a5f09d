//! Tracker configuration
//!
//! Configuration is an explicit value handed to each tracker. Two trackers in
//! the same process may point at different native binaries.

use derive_new::new;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_NATIVE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REFRESH_QUIET_PERIOD: Duration = Duration::from_millis(500);
const FALLBACK_NAME: &str = "unknown";
const FALLBACK_EMAIL: &str = "unknown@localhost";

/// Author and committer identity used for new commits
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Read `GIT_AUTHOR_NAME` and `GIT_AUTHOR_EMAIL`, falling back to a
    /// placeholder identity for whichever is missing.
    pub fn from_env() -> Self {
        let name = std::env::var("GIT_AUTHOR_NAME").unwrap_or_else(|_| FALLBACK_NAME.to_string());
        let email =
            std::env::var("GIT_AUTHOR_EMAIL").unwrap_or_else(|_| FALLBACK_EMAIL.to_string());

        Identity { name, email }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Native git executable; `None` selects the in-process backend
    pub git_executable: Option<PathBuf>,
    /// Decode file names in subprocess output as UTF-8 (otherwise Latin-1)
    pub utf8_file_names: bool,
    /// Upper bound for a single native git invocation
    pub native_timeout: Duration,
    /// Commit identity; `None` reads it from the environment
    pub identity: Option<Identity>,
    /// How long change notifications must stay quiet before a background
    /// refresh runs
    pub refresh_quiet_period: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            git_executable: None,
            utf8_file_names: true,
            native_timeout: DEFAULT_NATIVE_TIMEOUT,
            identity: None,
            refresh_quiet_period: DEFAULT_REFRESH_QUIET_PERIOD,
        }
    }
}

impl TrackerConfig {
    pub fn with_git_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.git_executable = Some(executable.into());
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_utf8_file_names(mut self, utf8: bool) -> Self {
        self.utf8_file_names = utf8;
        self
    }

    pub fn with_native_timeout(mut self, timeout: Duration) -> Self {
        self.native_timeout = timeout;
        self
    }

    pub fn with_refresh_quiet_period(mut self, quiet: Duration) -> Self {
        self.refresh_quiet_period = quiet;
        self
    }

    pub fn uses_native_git(&self) -> bool {
        self.git_executable.is_some()
    }

    pub fn identity(&self) -> Identity {
        self.identity.clone().unwrap_or_else(Identity::from_env)
    }
}
