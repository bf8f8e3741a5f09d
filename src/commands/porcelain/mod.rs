//! Porcelain operations
//!
//! - `init`: create the `.git` layout
//! - `add`: stage paths
//! - `reset`: unstage paths back to HEAD
//! - `commit`: record the index as a commit, optionally amending HEAD
//! - `checkout`: restore files from HEAD, switch branches
//! - `status`: render status listings

pub mod add;
pub mod checkout;
pub mod commit;
pub mod init;
pub mod reset;
pub mod status;
