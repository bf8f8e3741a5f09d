//! Git file-status tracker
//!
//! `gtrack` resolves the status of every file in a Git working tree by
//! reconciling the committed tree, the index and the working directory. Two
//! interchangeable backends produce the statuses: an in-process reader of the
//! object database and a native `git` binary whose porcelain output is parsed.
//!
//! The [`tracker::Tracker`] facade is the entry point used by front ends.

pub mod areas;
pub mod artifacts;
pub mod backend;
pub mod commands;
pub mod config;
pub mod errors;
pub mod tracker;

pub use artifacts::status::file_status::{FileStatus, GitFile};
pub use config::{Identity, TrackerConfig};
pub use errors::TrackerError;
pub use tracker::Tracker;
