//! Tree comparison and textual patches
//!
//! - `tree_diff`: Which blobs differ between two committed trees
//! - `patch`: Unified diff of a file's committed and working content

pub mod patch;
pub mod tree_diff;
