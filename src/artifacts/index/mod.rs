//! Git index file format
//!
//! The index (also called staging area or cache) records what the next commit
//! will contain, plus the stat data used to detect working-tree changes
//! without hashing every file.
//!
//! ## File Format
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 or 3 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - 62 fixed bytes, plus 2 extended-flag bytes on version 3 entries
//!     carrying the extended bit
//!   - NUL-terminated path, padded to 8-byte alignment
//!
//! Extensions (optional, skipped):
//!   - 4-byte signature, 4-byte size, payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Size of SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12;

/// Size of an extension header (signature + payload size)
pub const EXTENSION_HEADER_SIZE: usize = 8;

/// Magic signature identifying index files
pub const SIGNATURE: &str = "DIRC";

/// Version written back to disk
pub const VERSION: u32 = 2;

/// Versions that can be read
pub const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];
