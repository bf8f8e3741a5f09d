//! Core utilities shared across the tracker
//!
//! - `repo_path`: Canonical repository-relative paths and cache keys
//! - `debounce`: Coalescing debounce scheduler for background refreshes

pub mod debounce;
pub mod repo_path;
