//! Git index (staging area)
//!
//! The index records what the next commit will contain. Each path maps to one
//! entry per merge stage: stage 0 for a normal entry, stages 1-3 for the
//! base, ours and theirs sides of an unresolved conflict.
//!
//! ## Data Structures
//!
//! - `entries`: path to its entries, keyed by stage
//! - `children`: directory to the tracked paths beneath it, for directory and
//!   file/directory replacement lookups

use crate::artifacts::core::repo_path;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_FIXED_SIZE, EXTENDED_FLAGS_SIZE, EntryFlags, IndexEntry,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{EXTENSION_HEADER_SIZE, HEADER_SIZE};
use crate::artifacts::objects::object::{Packable, Unpackable};
use anyhow::Context;
use byteorder::ByteOrder;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    entries: BTreeMap<String, BTreeMap<u8, IndexEntry>>,
    children: BTreeMap<String, BTreeSet<String>>,
    header: IndexHeader,
    /// Modification time of the index file as last read or written
    mtime: Option<(i64, i64)>,
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            header: IndexHeader::empty(),
            mtime: None,
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.header = IndexHeader::empty();
        self.mtime = None;
        self.changed = false;
    }

    /// Load the index from disk under a shared lock.
    ///
    /// A missing or empty index file loads as an empty index; nothing is
    /// created on disk.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_context(|| format!("Unable to open index file {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .context("Unable to lock index file for reading")?;

        let metadata = lock.deref_mut().metadata()?;
        if metadata.len() == 0 {
            return Ok(());
        }
        let mtime = file_mtime(&metadata);

        let mut reader = Checksum::new(lock)?;
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;
        Self::skip_extensions(&mut reader)?;
        reader.verify()?;

        self.mtime = mtime;
        tracing::debug!(entries = entries_count, "loaded index");
        Ok(())
    }

    fn parse_header(&mut self, reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        self.header = IndexHeader::parse(&header_bytes)?;

        Ok(self.header.entries_count)
    }

    /// Entries are padded to 8 bytes counted from their start; version 3
    /// entries with the extended bit carry two more bytes before the name.
    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_FIXED_SIZE)?.to_vec();

            let flags = EntryFlags::from_bits_retain(byteorder::NetworkEndian::read_u16(
                &entry_bytes[ENTRY_FIXED_SIZE - 2..ENTRY_FIXED_SIZE],
            ));
            let name_start = if flags.contains(EntryFlags::EXTENDED) {
                ENTRY_FIXED_SIZE + EXTENDED_FLAGS_SIZE
            } else {
                ENTRY_FIXED_SIZE
            };
            let first_block_end = (name_start / ENTRY_BLOCK + 1) * ENTRY_BLOCK;
            entry_bytes.extend_from_slice(&reader.read(first_block_end - ENTRY_FIXED_SIZE)?);

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(std::io::Cursor::new(Bytes::from(entry_bytes)))?;
            self.store_entry(entry);
        }

        Ok(())
    }

    /// Extensions (cached trees, resolve-undo, ...) are hashed but not kept.
    fn skip_extensions(reader: &mut Checksum) -> anyhow::Result<()> {
        while reader.remaining_payload() > 0 {
            let extension_header = reader.read(EXTENSION_HEADER_SIZE)?;
            let signature = String::from_utf8_lossy(&extension_header[0..4]).into_owned();
            let size = byteorder::NetworkEndian::read_u32(&extension_header[4..8]) as usize;

            reader
                .read(size)
                .with_context(|| format!("Truncated index extension {signature}"))?;
            tracing::trace!(extension = %signature, size, "skipped index extension");
        }

        Ok(())
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries
            .entry(entry.name.clone())
            .or_default()
            .insert(entry.stage(), entry);
    }

    /// Drop a path with all of its stages.
    fn remove_entry(&mut self, path: &str) {
        if self.entries.remove(path).is_none() {
            return;
        }

        for parent in repo_path::parent_dirs(path) {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    fn remove_children(&mut self, path: &str) {
        if let Some(children) = self.children.remove(path) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    /// A file replaces any file entry at one of its parent directories, and
    /// a path that becomes a file drops everything beneath it.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.name);
    }

    /// Stage `entry` at stage 0, resolving any conflict recorded for its path.
    pub fn add(&mut self, entry: IndexEntry) {
        let entry = entry.with_stage(0);

        self.discard_conflicts(&entry);
        self.remove_entry(&entry.name);
        self.store_entry(entry);

        self.changed = true;
    }

    /// Remove `path` (every stage) or, for a directory, every path below it.
    pub fn remove(&mut self, path: &str) {
        self.remove_entry(path);
        self.remove_children(path);

        self.changed = true;
    }

    /// Write the index back as version 2 under an exclusive lock.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.changed {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("Unable to open index file {}", self.path.display()))?;

        {
            let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)
                .context("Unable to lock index file for writing")?;
            let mut writer = Checksum::new(lock)?;

            self.header = IndexHeader {
                entries_count: self.entries().count() as u32,
                ..IndexHeader::empty()
            };
            writer.write(&self.header.serialize()?)?;

            for entry in self.entries() {
                writer.write(&entry.serialize()?)?;
            }

            writer.write_checksum()?;
        }

        self.mtime = file_mtime(&index_file.metadata()?);
        self.changed = false;

        tracing::debug!(entries = self.header.entries_count, "wrote index");
        Ok(())
    }

    /// Every entry, ordered by path then stage
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values().flat_map(BTreeMap::values)
    }

    /// Every tracked path once, in byte order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The stage 0 entry for `path`
    pub fn entry_by_path(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path).and_then(|stages| stages.get(&0))
    }

    pub fn is_conflicted(&self, path: &str) -> bool {
        self.entries
            .get(path)
            .is_some_and(|stages| stages.keys().any(|&stage| stage > 0))
    }

    pub fn conflicted_paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, stages)| stages.keys().any(|&stage| stage > 0))
            .map(|(path, _)| path.as_str())
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicted_paths().next().is_some()
    }

    /// Whether `path` has an entry at any stage
    pub fn is_tracked_file(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Whether some tracked path lives beneath `path`
    pub fn is_tracked_directory(&self, path: &str) -> bool {
        self.children.contains_key(path)
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.is_tracked_file(path) || self.is_tracked_directory(path)
    }

    /// Tracked paths equal to or beneath `path`
    pub fn paths_under(&self, path: &str) -> Vec<String> {
        let mut paths = self
            .children
            .get(path)
            .map(|children| children.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        if self.is_tracked_file(path) {
            paths.insert(0, path.to_string());
        }

        paths
    }

    pub fn mtime(&self) -> Option<(i64, i64)> {
        self.mtime
    }
}

fn file_mtime(metadata: &std::fs::Metadata) -> Option<(i64, i64)> {
    let since_epoch = metadata
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?;

    Some((since_epoch.as_secs() as i64, since_epoch.subsec_nanos() as i64))
}
