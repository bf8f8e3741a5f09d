//! Git data structures and algorithms
//!
//! - `branch`: Branch name validation
//! - `checkout`: Tree-to-tree migration of the workspace and index
//! - `core`: Path normalization and the debounced scheduler
//! - `database`: Database entry types
//! - `diff`: Tree diffing and unified patches
//! - `index`: Index/staging area data structures
//! - `objects`: Git object types (blob, tree, commit)
//! - `status`: Status classification, the three-way walk, porcelain decoding
//!   and the status cache

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod objects;
pub mod status;
