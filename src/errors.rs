//! Errors callers are expected to tell apart
//!
//! Internals propagate `anyhow::Error`; the variants below travel inside it
//! and are recovered with `downcast_ref::<TrackerError>()`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("commit message cannot be empty")]
    EmptyCommitMessage,

    #[error("git executable not found or not runnable: {executable}")]
    NativeGitUnavailable { executable: PathBuf },

    #[error("git exited with status {status}: {stderr}")]
    NativeGitFailed { status: i32, stderr: String },

    #[error("git did not finish within {seconds} seconds")]
    NativeGitTimedOut { seconds: u64 },

    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("cannot commit with unresolved conflicts in the index")]
    UnresolvedConflicts,

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("branch {0} already exists")]
    BranchExists(String),

    #[error("checkout would lose local changes:\n{0}")]
    CheckoutConflict(String),

    #[error("branch {0} not found")]
    BranchNotFound(String),
}

impl TrackerError {
    /// Whether the failure came from the native binary and the caller may
    /// retry or fall back to the in-process backend.
    pub fn is_native_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::NativeGitUnavailable { .. }
                | TrackerError::NativeGitFailed { .. }
                | TrackerError::NativeGitTimedOut { .. }
        )
    }
}
