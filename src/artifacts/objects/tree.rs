//! Git tree object
//!
//! Trees represent directory snapshots. Each entry names a blob (file), a
//! nested tree (directory), a symlink or a submodule commit.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! A tree is either read from the database (`readable_entries`) or built
//! from stage-0 index entries (`writeable_entries`) before being stored.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

#[derive(Debug, Clone)]
enum TreeEntry {
    File(IndexEntry),
    Directory(Tree),
}

impl TreeEntry {
    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::File(entry) => entry.metadata.mode,
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeEntry::File(entry) => Ok(entry.oid),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    readable_entries: BTreeMap<String, DatabaseEntry>,
    /// Directory names carry a trailing `/` so the map iterates in Git's
    /// tree order
    writeable_entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Build the root tree from index entries, nesting them by path.
    pub fn build<'e>(entries: impl Iterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let parents = entry
                .parent_dirs()
                .into_iter()
                .map(crate::artifacts::core::repo_path::basename)
                .collect::<Vec<_>>();
            root.add_entry(&parents, entry);
        }

        Ok(root)
    }

    /// Visit nested trees before their parent, so child ids exist when the
    /// parent is stored.
    pub fn traverse<F>(&self, func: &F) -> anyhow::Result<()>
    where
        F: Fn(&Tree) -> anyhow::Result<()>,
    {
        for entry in self.writeable_entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(func)?;
            }
        }

        func(self)
    }

    fn add_entry(&mut self, parents: &[&str], entry: &IndexEntry) {
        match parents.split_first() {
            None => {
                self.writeable_entries
                    .insert(entry.basename().to_string(), TreeEntry::File(entry.clone()));
            }
            Some((parent, rest)) => {
                let key = format!("{parent}/");
                let slot = self
                    .writeable_entries
                    .entry(key)
                    .or_insert_with(|| TreeEntry::Directory(Tree::default()));

                if let TreeEntry::File(_) = slot {
                    *slot = TreeEntry::Directory(Tree::default());
                }
                if let TreeEntry::Directory(tree) = slot {
                    tree.add_entry(rest, entry);
                }
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.readable_entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.readable_entries.into_iter()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();

        for (name, tree_entry) in &self.writeable_entries {
            let name = name.trim_end_matches('/');

            write!(content, "{} {}\0", tree_entry.mode().as_str(), name)?;
            tree_entry.oid()?.write_to(&mut content)?;
        }

        frame(self.object_type(), &content)
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            if reader.read_until(b' ', &mut mode_bytes)? == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = String::from_utf8_lossy(&name_bytes).into_owned();

            let oid = ObjectId::read_from(&mut reader).context("unexpected EOF in object id")?;

            entries.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree {
            readable_entries: entries,
            writeable_entries: BTreeMap::new(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use pretty_assertions::assert_eq;

    fn entry(name: &str) -> IndexEntry {
        IndexEntry::new(
            name.to_string(),
            ObjectId::hash_of(name.as_bytes()),
            EntryMetadata {
                mode: EntryMode::File(FileMode::Regular),
                ..Default::default()
            },
        )
    }

    #[test]
    fn directories_sort_as_if_suffixed_with_a_slash() {
        let entries = [entry("a.txt"), entry("a/b.txt"), entry("a-c.txt")];
        let tree = Tree::build(entries.iter()).unwrap();

        let names = tree.writeable_entries.keys().cloned().collect::<Vec<_>>();
        assert_eq!(names, vec!["a-c.txt", "a.txt", "a/"]);
    }

    #[test]
    fn serialized_tree_reads_back_its_entries() {
        let entries = [entry("one.txt"), entry("two.txt")];
        let tree = Tree::build(entries.iter()).unwrap();
        let bytes = tree.serialize().unwrap();

        let mut reader = std::io::Cursor::new(bytes);
        ObjectType::parse_object_type(&mut reader).unwrap();
        let parsed = Tree::deserialize(reader).unwrap();

        let names = parsed.entries().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["one.txt", "two.txt"]);
    }
}
