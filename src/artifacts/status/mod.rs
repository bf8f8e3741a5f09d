//! Working tree status resolution
//!
//! ## Components
//!
//! - `file_status`: Status values and changed-file records
//! - `file_change`: Per-area change kinds and the decision table
//! - `inspector`: Index, tree and working-file comparisons
//! - `status_info`: Single-path and whole-tree resolution over a snapshot
//! - `porcelain`: Decoding of the native binary's porcelain output
//! - `cache`: Case-insensitive status cache

pub mod cache;
pub mod file_change;
pub mod file_status;
pub mod inspector;
pub mod porcelain;
pub mod status_info;
