//! Index entry representation
//!
//! Each entry in the index represents a tracked path at a given merge stage:
//! - Repository-relative path (`/`-separated)
//! - Content hash (object ID)
//! - Stat data (mode, size, timestamps) for fast change detection
//! - Flags: assume-valid, extended, merge stage and name length
//!
//! Entries are stored in a binary format with 8-byte alignment.

use crate::artifacts::core::repo_path;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::path::Path;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Fixed-size part of an entry, up to and including the flags
pub const ENTRY_FIXED_SIZE: usize = 62;

/// Size of the version 3 extended flags field
pub const EXTENDED_FLAGS_SIZE: usize = 2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u16 {
        const ASSUME_VALID = 0x8000;
        const EXTENDED = 0x4000;
        const STAGE = 0x3000;
        const NAME_LENGTH = 0x0FFF;
    }
}

impl EntryFlags {
    const STAGE_SHIFT: u16 = 12;

    pub fn stage(&self) -> u8 {
        ((self.bits() & Self::STAGE.bits()) >> Self::STAGE_SHIFT) as u8
    }

    pub fn with_stage(self, stage: u8) -> Self {
        let bits = (self.bits() & !Self::STAGE.bits())
            | (((stage as u16) << Self::STAGE_SHIFT) & Self::STAGE.bits());
        Self::from_bits_retain(bits)
    }

    /// Flags as written by the version 2 writer: the merge stage and
    /// assume-valid bit survive, the name length is recomputed and the
    /// extended bit is dropped along with the extended field.
    fn for_write(&self, name_len: usize) -> Self {
        let keep = self.bits() & (Self::ASSUME_VALID.bits() | Self::STAGE.bits());
        let name_len = name_len.min(Self::NAME_LENGTH.bits() as usize) as u16;
        Self::from_bits_retain(keep | name_len)
    }
}

/// Index entry representing a tracked path at one merge stage
#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// Path relative to repository root, `/`-separated
    pub name: String,
    /// SHA-1 hash of file content
    pub oid: ObjectId,
    /// Stat data and flags
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn basename(&self) -> &str {
        repo_path::basename(&self.name)
    }

    pub fn parent_dirs(&self) -> Vec<&str> {
        repo_path::parent_dirs(&self.name)
    }

    /// Merge stage: 0 for a normal entry, 1-3 for the sides of a conflict
    pub fn stage(&self) -> u8 {
        self.metadata.flags.stage()
    }

    pub fn with_stage(mut self, stage: u8) -> Self {
        self.metadata.flags = self.metadata.flags.with_stage(stage);
        self
    }

    /// Size and mode agree with the working file. A recorded size of zero
    /// means the size is unknown.
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size as u32 == other.size as u32)
            && self.metadata.mode == other.mode
    }

    /// Timestamps agree with the working file, at the 32-bit precision the
    /// index stores them with.
    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime as u32 == other.ctime as u32
            && self.metadata.ctime_nsec as u32 == other.ctime_nsec as u32
            && self.metadata.mtime as u32 == other.mtime as u32
            && self.metadata.mtime_nsec as u32 == other.mtime_nsec as u32
    }

    /// Whether the working file may have changed in the same timestamp tick
    /// the index was written in, which stat data cannot detect.
    pub fn is_racy(&self, index_mtime: Option<(i64, i64)>) -> bool {
        match index_mtime {
            Some(index_mtime) => {
                (self.metadata.mtime, self.metadata.mtime_nsec) >= index_mtime
            }
            None => true,
        }
    }
}

/// File metadata stored in index entries
///
/// ## Timestamps
///
/// - `ctime`: File status change time (inode modification)
/// - `mtime`: File content modification time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub flags: EntryFlags,
}

impl EntryMetadata {
    /// Stat data for a working-tree path, without following symlinks
    pub fn from_fs(absolute_path: &Path, metadata: &Metadata) -> Self {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if metadata.file_type().is_symlink() {
            EntryMode::Symlink
        } else if absolute_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        Self::with_platform_stat(mode, metadata)
    }

    #[cfg(unix)]
    fn with_platform_stat(mode: EntryMode, metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        EntryMetadata {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.len(),
            flags: EntryFlags::empty(),
        }
    }

    #[cfg(not(unix))]
    fn with_platform_stat(mode: EntryMode, metadata: &Metadata) -> Self {
        let (mtime, mtime_nsec) = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|since| (since.as_secs() as i64, since.subsec_nanos() as i64))
            .unwrap_or_default();

        EntryMetadata {
            ctime: mtime,
            ctime_nsec: mtime_nsec,
            mtime,
            mtime_nsec,
            mode,
            size: metadata.len(),
            ..Default::default()
        }
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.stage() == other.stage()
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .as_bytes()
            .cmp(other.name.as_bytes())
            .then(self.stage().cmp(&other.stage()))
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let flags = self.metadata.flags.for_write(self.name.len());

        let mut entry_bytes = Vec::with_capacity(ENTRY_FIXED_SIZE + self.name.len() + ENTRY_BLOCK);
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(flags.bits())?;
        entry_bytes.write_all(self.name.as_bytes())?;

        // at least one NUL, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let bytes = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        if bytes.len() < ENTRY_FIXED_SIZE + 1 {
            return Err(anyhow::anyhow!("Invalid index entry size"));
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode: EntryMode = byteorder::NetworkEndian::read_u32(&bytes[24..28]).into();
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let oid = ObjectId::from_bytes(&bytes[40..60])?;
        let flags =
            EntryFlags::from_bits_retain(byteorder::NetworkEndian::read_u16(&bytes[60..62]));

        let name_start = if flags.contains(EntryFlags::EXTENDED) {
            ENTRY_FIXED_SIZE + EXTENDED_FLAGS_SIZE
        } else {
            ENTRY_FIXED_SIZE
        };

        let name_end = bytes[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("Missing null terminator in entry name"))?;
        let name = String::from_utf8_lossy(&bytes[name_start..name_start + name_end]).into_owned();

        Ok(IndexEntry {
            name,
            oid,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
                flags,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::hash_of(b"test data")
    }

    #[fixture]
    fn entry_metadata() -> EntryMetadata {
        EntryMetadata {
            mode: EntryMode::File(FileMode::Regular),
            size: 9,
            ..Default::default()
        }
    }

    #[rstest]
    fn entry_parent_dirs(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new("a/b/c".to_string(), oid, entry_metadata);

        assert_eq!(entry.parent_dirs(), vec!["a", "a/b"]);
        assert_eq!(entry.basename(), "c");
    }

    #[rstest]
    fn stage_survives_serialization(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new("conflicted.txt".to_string(), oid, entry_metadata).with_stage(2);
        let bytes = entry.serialize().unwrap();

        assert_eq!(bytes.len() % ENTRY_BLOCK, 0);

        let parsed = IndexEntry::deserialize(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.stage(), 2);
        assert_eq!(parsed.name, "conflicted.txt");
        assert_eq!(parsed.metadata.flags.bits() & EntryFlags::NAME_LENGTH.bits(), 14);
    }

    #[rstest]
    fn extended_entries_skip_the_extended_field(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new("x.txt".to_string(), oid.clone(), entry_metadata);
        let mut bytes = entry.serialize().unwrap().to_vec();

        // turn the version 2 entry into a version 3 one with an extended field
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]) | EntryFlags::EXTENDED.bits();
        bytes[60..62].copy_from_slice(&flags.to_be_bytes());
        bytes.splice(62..62, [0u8, 0u8]);

        let parsed = IndexEntry::deserialize(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.name, "x.txt");
        assert_eq!(parsed.oid, oid);
    }

    #[rstest]
    fn zero_size_means_unknown(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(
            "a".to_string(),
            oid,
            EntryMetadata {
                size: 0,
                ..entry_metadata.clone()
            },
        );

        assert!(entry.stat_match(&EntryMetadata {
            size: 1234,
            ..entry_metadata
        }));
    }

    #[rstest]
    fn entries_order_by_bytes_then_stage(oid: ObjectId, entry_metadata: EntryMetadata) {
        let mut entries = vec![
            IndexEntry::new("b".to_string(), oid.clone(), entry_metadata.clone()).with_stage(3),
            IndexEntry::new("a-b".to_string(), oid.clone(), entry_metadata.clone()),
            IndexEntry::new("a/b".to_string(), oid.clone(), entry_metadata.clone()),
            IndexEntry::new("b".to_string(), oid, entry_metadata).with_stage(1),
        ];
        entries.sort();

        let order = entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.stage()))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![("a-b", 0), ("a/b", 0), ("b", 1), ("b", 3)]);
    }
}
