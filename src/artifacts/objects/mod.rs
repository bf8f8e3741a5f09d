//! Git object types
//!
//! Git stores content as objects identified by SHA-1 hashes:
//!
//! - **Blob**: File content (raw bytes)
//! - **Tree**: Directory listing (names, modes, and object IDs)
//! - **Commit**: Snapshot with metadata (tree, parents, author, message)
//!
//! All objects share the loose-object encoding `<type> <size>\0<content>`.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a SHA-1 hash in bytes
pub const OBJECT_ID_BYTES: usize = 20;

/// Length of an abbreviated object ID
pub const SHORT_OBJECT_ID_LENGTH: usize = 7;
