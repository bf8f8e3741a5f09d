//! Repository areas
//!
//! - `database`: loose object store (blobs, trees, commits)
//! - `ignore`: root `.gitignore` rules
//! - `index`: staging area, including conflict stages
//! - `refs`: HEAD and branches
//! - `repository`: ties the areas together for one working directory
//! - `workspace`: working directory access

pub mod database;
pub mod ignore;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
