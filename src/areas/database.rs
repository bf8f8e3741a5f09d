//! Loose object database
//!
//! Objects live zlib-compressed under `objects/xx/yyyy...`. Only loose objects
//! are read; packed objects surface as read errors.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{TreeDiff, TreeEntryMap};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::status::status_info::HeadTree;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn tree_diff(
        &self,
        old_oid: Option<&ObjectId>,
        new_oid: Option<&ObjectId>,
    ) -> anyhow::Result<TreeDiff<'_>> {
        let mut tree_diff = TreeDiff::new(self);
        tree_diff.compare_oids(old_oid, new_oid, "")?;
        Ok(tree_diff)
    }

    /// Store `object` unless it already exists; returns its id.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = ObjectId::hash_of(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if !object_path.exists() {
            let object_dir = object_path
                .parent()
                .with_context(|| format!("Invalid object path {}", object_path.display()))?;
            std::fs::create_dir_all(object_dir).with_context(|| {
                format!("Unable to create object directory {}", object_dir.display())
            })?;

            self.write_object(object_path, object_content)?;
        }

        Ok(object_id)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).exists()
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Blob content by id
    pub fn load_blob(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let blob = self
            .parse_object_as_blob(object_id)?
            .with_context(|| format!("Object {object_id} is not a blob"))?;

        Ok(blob.into_content())
    }

    /// Top-level entries of a tree, or of a commit's tree.
    pub fn load_tree_entries(&self, object_id: &ObjectId) -> anyhow::Result<TreeEntryMap> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Tree::deserialize(object_reader)?.into_entries().collect()),
            ObjectType::Commit => {
                let commit = Commit::deserialize(object_reader)?;
                self.load_tree_entries(commit.tree_oid())
            }
            other => Err(anyhow::anyhow!(
                "Object {object_id} is a {other}, expected a tree or commit"
            )),
        }
    }

    /// Every non-tree entry reachable from a commit or tree, keyed by full
    /// path. `None` yields the empty tree.
    pub fn load_tree_list(&self, object_id: Option<&ObjectId>) -> anyhow::Result<HeadTree> {
        let mut tree_list = HeadTree::new();

        if let Some(object_id) = object_id {
            self.build_tree_list(object_id, "", &mut tree_list)?;
        }

        Ok(tree_list)
    }

    fn build_tree_list(
        &self,
        object_id: &ObjectId,
        prefix: &str,
        tree_list: &mut HeadTree,
    ) -> anyhow::Result<()> {
        for (name, entry) in self.load_tree_entries(object_id)? {
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };

            if entry.is_tree() {
                self.build_tree_list(&entry.oid, &path, tree_list)?;
            } else {
                tree_list.insert(path, DatabaseEntry::new(entry.oid, entry.mode));
            }
        }

        Ok(())
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl BufRead)> {
        let object_path = self.path.join(object_id.to_path());
        let object_content = self.read_object(object_path)?;
        let mut object_reader = Cursor::new(object_content);

        let object_type = ObjectType::parse_object_type(&mut object_reader)?;

        Ok((object_type, object_reader))
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(&object_path)
            .with_context(|| format!("Unable to read object file {}", object_path.display()))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| {
                format!("Unable to open object file {}", temp_object_path.display())
            })?;

        file.write_all(&object_content).with_context(|| {
            format!("Unable to write object file {}", temp_object_path.display())
        })?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).with_context(|| {
            format!("Unable to rename object file to {}", object_path.display())
        })?;

        tracing::trace!(object = %object_path.display(), "stored object");
        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp_obj_{}", rand::random::<u32>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
    use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    fn indexed(database: &Database, name: &str, content: &str) -> IndexEntry {
        let oid = database
            .store(&Blob::new(Bytes::from(content.to_string())))
            .unwrap();
        IndexEntry::new(
            name.to_string(),
            oid,
            EntryMetadata {
                mode: EntryMode::File(FileMode::Regular),
                ..Default::default()
            },
        )
    }

    #[rstest]
    fn blobs_read_back_byte_for_byte(database: (tempfile::TempDir, Database)) {
        let (_dir, database) = database;
        let content = Bytes::from_static(b"caf\xc3\xa9 \xe4\xb8\xad\xe6\x96\x87\n\xff");
        let oid = database.store(&Blob::new(content.clone())).unwrap();

        assert!(database.contains(&oid));
        assert_eq!(database.load_blob(&oid).unwrap(), content);
    }

    #[rstest]
    fn tree_list_flattens_nested_trees(database: (tempfile::TempDir, Database)) {
        let (_dir, database) = database;
        let entries = [
            indexed(&database, "README.md", "readme"),
            indexed(&database, "src/lib.rs", "lib"),
            indexed(&database, "src/bin/main.rs", "main"),
        ];

        let tree = Tree::build(entries.iter()).unwrap();
        tree.traverse(&|tree: &Tree| database.store(tree).map(|_| ()))
            .unwrap();
        let tree_oid = tree.object_id().unwrap();

        let tree_list = database.load_tree_list(Some(&tree_oid)).unwrap();
        let paths = tree_list.keys().cloned().collect::<Vec<_>>();

        assert_eq!(paths, vec!["README.md", "src/bin/main.rs", "src/lib.rs"]);
        assert_eq!(tree_list["src/lib.rs"].oid, entries[1].oid);
    }

    #[rstest]
    fn missing_head_yields_the_empty_tree(database: (tempfile::TempDir, Database)) {
        let (_dir, database) = database;

        assert!(database.load_tree_list(None).unwrap().is_empty());
    }
}
